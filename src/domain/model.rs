use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 未注入或注入無效值時使用的預設埠
pub const DEFAULT_PORT: u16 = 5005;

/// 承載埠覆蓋值的環境變數
pub const PORT_ENV_VAR: &str = "PORT";

pub const DEFAULT_MODEL_NAME: &str = "model";

/// 引擎產出的模型封存副檔名
pub const ARTIFACT_EXTENSION: &str = "tar.gz";

/// 建置階段的完整輸入集合，全部必須存在
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInputs {
    pub config: PathBuf,
    pub domain: PathBuf,
    pub endpoints: PathBuf,
    pub credentials: PathBuf,
    pub data_dir: PathBuf,
}

impl BuildInputs {
    /// 以 (名稱, 路徑, 是否為目錄) 列出所有必要輸入
    pub fn required(&self) -> [(&'static str, &Path, bool); 5] {
        [
            ("config", self.config.as_path(), false),
            ("domain", self.domain.as_path(), false),
            ("endpoints", self.endpoints.as_path(), false),
            ("credentials", self.credentials.as_path(), false),
            ("data", self.data_dir.as_path(), true),
        ]
    }

    /// 回傳缺少的輸入 (顯示用路徑)
    pub fn missing(&self) -> Vec<String> {
        self.required()
            .into_iter()
            .filter(|(_, path, is_dir)| {
                if *is_dir {
                    !path.is_dir()
                } else {
                    !path.is_file()
                }
            })
            .map(|(_, path, _)| path.display().to_string())
            .collect()
    }
}

/// 固定名稱的訓練產物。名稱在每次建置間保持不變。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifact {
    name: String,
    models_dir: PathBuf,
}

impl ModelArtifact {
    pub fn new(models_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            models_dir: models_dir.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, ARTIFACT_EXTENSION)
    }

    pub fn path(&self) -> PathBuf {
        self.models_dir.join(self.file_name())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.models_dir.join(format!("{}.manifest.json", self.name))
    }

    /// 產物存在且為非空檔案才算可載入
    pub fn is_present(&self) -> bool {
        std::fs::metadata(self.path())
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }
}

/// 建置完成後寫在產物旁的描述檔
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub name: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub built_at: DateTime<Utc>,
    pub inputs: BuildInputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildPrivilege {
    /// 沿用呼叫者的權限
    #[default]
    Inherit,
    /// 需要 root，否則在訓練前失敗
    RequireRoot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    /// 以伺服器取代目前程序映像 (Unix)
    #[default]
    Exec,
    /// 以直接子程序啟動並轉交終止訊號
    Supervise,
}

/// 埠解析的結果，保留來源以便記錄
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortResolution {
    Override(u16),
    Default,
    Fallback { raw: String, reason: String },
}

impl PortResolution {
    pub fn port(&self) -> u16 {
        match self {
            PortResolution::Override(port) => *port,
            PortResolution::Default | PortResolution::Fallback { .. } => DEFAULT_PORT,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PortResolution::Fallback { .. })
    }
}

/// 程序啟動時解析一次，之後不可變
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub cors: Option<String>,
    pub enable_api: bool,
    pub credentials: Option<PathBuf>,
    pub endpoints: Option<PathBuf>,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub artifact: ModelArtifact,
    pub launch_mode: LaunchMode,
    pub shutdown_grace_seconds: u64,
}
