use crate::domain::model::{BuildInputs, ModelArtifact, ServiceConfig};
use crate::utils::error::Result;
use async_trait::async_trait;

/// 唯讀的環境來源，讓埠解析不必直接讀全域狀態
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// 外部引擎的訓練入口
#[async_trait]
pub trait Trainer: Send + Sync {
    /// 執行訓練，成功時產物須位於 `artifact.path()`
    async fn train(&self, inputs: &BuildInputs, artifact: &ModelArtifact) -> Result<()>;

    /// 實際會執行的命令列 (dry run 顯示用)
    fn describe(&self, inputs: &BuildInputs, artifact: &ModelArtifact) -> Vec<String>;
}

/// 外部引擎的 HTTP 伺服器入口
#[async_trait]
pub trait ServerRunner: Send + Sync {
    /// 啟動伺服器並阻塞直到結束。收到終止訊號而正常結束時回傳 Ok。
    async fn run(&self, config: &ServiceConfig) -> Result<()>;

    fn describe(&self, config: &ServiceConfig) -> Vec<String>;
}
