use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Missing build inputs: {}", .missing.join(", "))]
    BuildInputMissing { missing: Vec<String> },

    #[error("Training failed: {message}")]
    TrainingFailure { message: String },

    #[error("Model artifact not found: {path}")]
    ArtifactMissing { path: String },

    #[error("Cannot bind port {port}: {source}")]
    PortBindFailure {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Server exited with status {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    ServerExited { code: Option<i32> },

    #[error("Insufficient privilege: {message}")]
    PrivilegeError { message: String },

    #[error("Engine status probe failed: {message}")]
    StatusProbeError { message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, DeployError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Build,
    Serve,
    Configuration,
    Network,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl DeployError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DeployError::BuildInputMissing { .. }
            | DeployError::TrainingFailure { .. }
            | DeployError::PrivilegeError { .. } => ErrorCategory::Build,
            DeployError::ArtifactMissing { .. }
            | DeployError::PortBindFailure { .. }
            | DeployError::ServerExited { .. } => ErrorCategory::Serve,
            DeployError::StatusProbeError { .. } | DeployError::HttpError(_) => {
                ErrorCategory::Network
            }
            DeployError::ConfigError { .. }
            | DeployError::ConfigValidationError { .. }
            | DeployError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            DeployError::IoError(_) | DeployError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeployError::StatusProbeError { .. } | DeployError::HttpError(_) => {
                ErrorSeverity::Medium
            }
            DeployError::ConfigError { .. }
            | DeployError::ConfigValidationError { .. }
            | DeployError::InvalidConfigValueError { .. } => ErrorSeverity::High,
            _ => ErrorSeverity::Critical,
        }
    }

    /// 每種失敗對應一個可區分的退出碼
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::BuildInputMissing { .. } => 2,
            DeployError::TrainingFailure { .. } => 3,
            DeployError::ArtifactMissing { .. } => 4,
            DeployError::PortBindFailure { .. } => 5,
            DeployError::PrivilegeError { .. } => 6,
            DeployError::StatusProbeError { .. } | DeployError::HttpError(_) => 7,
            DeployError::ServerExited { code } => match code {
                Some(c) if *c != 0 => *c,
                _ => 1,
            },
            _ => 1,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            DeployError::BuildInputMissing { .. } => {
                "Add the missing files to the build context before rebuilding the image".to_string()
            }
            DeployError::TrainingFailure { .. } => {
                "Check the engine output above; fix the training data or config and rebuild".to_string()
            }
            DeployError::ArtifactMissing { .. } => {
                "Run `dialog-deploy build` during the image build so the model is baked in".to_string()
            }
            DeployError::PortBindFailure { port, .. } => format!(
                "Port {} is in use or not permitted; free it or inject a different PORT",
                port
            ),
            DeployError::ServerExited { .. } => {
                "Inspect the engine logs; the orchestrator is responsible for restarts".to_string()
            }
            DeployError::PrivilegeError { .. } => {
                "Run the build as root or set build.privilege = \"inherit\"".to_string()
            }
            DeployError::StatusProbeError { .. } | DeployError::HttpError(_) => {
                "Make sure the engine is running and the status URL is reachable".to_string()
            }
            DeployError::ConfigError { .. }
            | DeployError::ConfigValidationError { .. }
            | DeployError::InvalidConfigValueError { .. } => {
                "Review deploy.toml and command line flags".to_string()
            }
            DeployError::IoError(_) => "Check file permissions and disk space".to_string(),
            DeployError::SerializationError(_) => "Check the manifest file contents".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DeployError::BuildInputMissing { missing } => format!(
                "Build aborted, required inputs are missing: {}",
                missing.join(", ")
            ),
            DeployError::TrainingFailure { .. } => {
                "Build aborted, model training did not succeed".to_string()
            }
            DeployError::ArtifactMissing { path } => {
                format!("No trained model at {}, refusing to start the server", path)
            }
            DeployError::PortBindFailure { port, .. } => {
                format!("Cannot listen on port {}", port)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_for_fatal_errors() {
        let errors = vec![
            DeployError::BuildInputMissing {
                missing: vec!["credentials.yml".to_string()],
            },
            DeployError::TrainingFailure {
                message: "boom".to_string(),
            },
            DeployError::ArtifactMissing {
                path: "models/model.tar.gz".to_string(),
            },
            DeployError::PortBindFailure {
                port: 5005,
                source: std::io::Error::from(std::io::ErrorKind::AddrInUse),
            },
        ];

        let mut codes: Vec<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.dedup();
        assert_eq!(codes.len(), 4);
    }

    #[test]
    fn test_server_exit_code_passthrough() {
        assert_eq!(DeployError::ServerExited { code: Some(42) }.exit_code(), 42);
        assert_eq!(DeployError::ServerExited { code: None }.exit_code(), 1);
        assert_eq!(DeployError::ServerExited { code: Some(0) }.exit_code(), 1);
    }

    #[test]
    fn test_build_input_missing_lists_files() {
        let err = DeployError::BuildInputMissing {
            missing: vec!["domain.yml".to_string(), "data".to_string()],
        };
        assert_eq!(err.to_string(), "Missing build inputs: domain.yml, data");
        assert_eq!(err.category(), ErrorCategory::Build);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
