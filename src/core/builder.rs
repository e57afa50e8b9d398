use crate::domain::model::{ArtifactManifest, BuildInputs, BuildPrivilege, ModelArtifact};
use crate::domain::ports::Trainer;
use crate::utils::error::{DeployError, Result};
use crate::utils::monitor::{self, SystemMonitor};
use chrono::Utc;
use std::time::Instant;

/// 建置結果
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub artifact: ModelArtifact,
    pub manifest: ArtifactManifest,
}

/// 產物建置器：驗證輸入、執行訓練、確認固定名稱的產物存在
pub struct ArtifactBuilder<T: Trainer> {
    trainer: T,
    inputs: BuildInputs,
    artifact: ModelArtifact,
    privilege: BuildPrivilege,
    monitor: SystemMonitor,
}

impl<T: Trainer> ArtifactBuilder<T> {
    pub fn new(trainer: T, inputs: BuildInputs, artifact: ModelArtifact) -> Self {
        Self {
            trainer,
            inputs,
            artifact,
            privilege: BuildPrivilege::Inherit,
            monitor: SystemMonitor::new(false),
        }
    }

    pub fn with_privilege(mut self, privilege: BuildPrivilege) -> Self {
        self.privilege = privilege;
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = SystemMonitor::new(enabled);
        self
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// 檢查輸入並回傳將執行的訓練命令，不產生任何檔案
    pub fn plan(&self) -> Result<Vec<String>> {
        self.check_inputs()?;
        Ok(self.trainer.describe(&self.inputs, &self.artifact))
    }

    pub async fn build(&self) -> Result<BuildOutcome> {
        check_privilege(self.privilege, monitor::effective_uid())?;
        self.check_inputs()?;

        let models_dir = self.artifact.models_dir();
        std::fs::create_dir_all(models_dir)?;
        // 先移除舊產物，失敗的重建不能留下看似新鮮的模型
        self.remove_outputs()?;

        tracing::info!(
            "🏗️ Training model '{}' into {}",
            self.artifact.name(),
            models_dir.display()
        );
        tracing::debug!(
            "Trainer command: {}",
            self.trainer.describe(&self.inputs, &self.artifact).join(" ")
        );
        self.monitor.log_stats("Before training");

        let started = Instant::now();
        if let Err(e) = self.trainer.train(&self.inputs, &self.artifact).await {
            self.discard_outputs();
            return Err(match e {
                DeployError::TrainingFailure { .. } => e,
                other => DeployError::TrainingFailure {
                    message: other.to_string(),
                },
            });
        }

        self.monitor.log_stats("After training");
        self.monitor.log_final_stats();

        if !self.artifact.is_present() {
            self.discard_outputs();
            return Err(DeployError::TrainingFailure {
                message: format!(
                    "trainer finished but {} was not produced",
                    self.artifact.path().display()
                ),
            });
        }

        let manifest = ArtifactManifest {
            name: self.artifact.name().to_string(),
            file_name: self.artifact.file_name(),
            size_bytes: std::fs::metadata(self.artifact.path())?.len(),
            built_at: Utc::now(),
            inputs: self.inputs.clone(),
        };
        std::fs::write(
            self.artifact.manifest_path(),
            serde_json::to_vec_pretty(&manifest)?,
        )?;

        tracing::info!(
            "✅ Model artifact ready: {} ({} bytes, {:?})",
            self.artifact.path().display(),
            manifest.size_bytes,
            started.elapsed()
        );

        Ok(BuildOutcome {
            artifact: self.artifact.clone(),
            manifest,
        })
    }

    fn check_inputs(&self) -> Result<()> {
        let missing = self.inputs.missing();
        if !missing.is_empty() {
            for path in &missing {
                tracing::error!("❌ Required build input missing: {}", path);
            }
            return Err(DeployError::BuildInputMissing { missing });
        }
        Ok(())
    }

    fn remove_outputs(&self) -> Result<()> {
        for path in [self.artifact.path(), self.artifact.manifest_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed previous output {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// 失敗路徑上的清理：清不掉只記錄，保留原本的訓練錯誤
    fn discard_outputs(&self) {
        if let Err(e) = self.remove_outputs() {
            tracing::warn!(
                "⚠️ Could not remove partial output for '{}': {}",
                self.artifact.name(),
                e
            );
        }
    }
}

/// 依設定檢查建置程序的權限
pub fn check_privilege(privilege: BuildPrivilege, effective_uid: Option<u32>) -> Result<()> {
    match (privilege, effective_uid) {
        (BuildPrivilege::Inherit, _) => Ok(()),
        (BuildPrivilege::RequireRoot, Some(0)) => Ok(()),
        (BuildPrivilege::RequireRoot, Some(uid)) => Err(DeployError::PrivilegeError {
            message: format!("build requires root but is running as uid {}", uid),
        }),
        (BuildPrivilege::RequireRoot, None) => Err(DeployError::PrivilegeError {
            message: "build requires root but the effective uid could not be determined"
                .to_string(),
        }),
    }
}

/// 讀取先前建置留下的描述檔
pub fn read_manifest(artifact: &ModelArtifact) -> Result<ArtifactManifest> {
    let content = std::fs::read(artifact.manifest_path())?;
    Ok(serde_json::from_slice(&content)?)
}
