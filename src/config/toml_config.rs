use crate::adapters::engine_cli::{EngineCli, DEFAULT_ENGINE_COMMAND};
use crate::adapters::status::{DEFAULT_STATUS_URL, STATUS_URL_ENV_VAR};
use crate::core::launcher::{ServeOptions, DEFAULT_HOST, DEFAULT_SHUTDOWN_GRACE_SECONDS};
use crate::domain::model::{
    BuildInputs, BuildPrivilege, LaunchMode, ModelArtifact, DEFAULT_MODEL_NAME,
};
use crate::domain::ports::EnvSource;
use crate::utils::error::{DeployError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "deploy.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    pub project: ProjectConfig,
    pub engine: EngineConfig,
    pub build: BuildConfig,
    pub serve: ServeConfig,
    pub status: StatusConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub command: Option<String>,
    pub train_args: Option<Vec<String>>,
    pub run_args: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub config: Option<PathBuf>,
    pub domain: Option<PathBuf>,
    pub endpoints: Option<PathBuf>,
    pub credentials: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub models_dir: Option<PathBuf>,
    pub model_name: Option<String>,
    pub privilege: Option<BuildPrivilege>,
    pub monitor: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub host: Option<String>,
    pub enable_api: Option<bool>,
    pub cors: Option<String>,
    pub credentials: Option<PathBuf>,
    pub endpoints: Option<PathBuf>,
    pub debug: Option<bool>,
    pub log_file: Option<PathBuf>,
    pub launch_mode: Option<LaunchMode>,
    pub shutdown_grace_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl DeployConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| DeployError::ConfigError {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DeployError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 指定路徑時必須存在；未指定時讀取工作目錄下的 deploy.toml，沒有就用預設值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                tracing::debug!("Using {} from working directory", DEFAULT_CONFIG_FILE);
                Self::from_file(DEFAULT_CONFIG_FILE)
            }
            None => Ok(Self::default()),
        }
    }

    /// 替換環境變數 (例如 ${MODEL_NAME})，未設定的保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| DeployError::ConfigError {
            message: format!("invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn model_name(&self) -> &str {
        self.build.model_name.as_deref().unwrap_or(DEFAULT_MODEL_NAME)
    }

    pub fn models_dir(&self) -> PathBuf {
        self.build
            .models_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("models"))
    }

    pub fn artifact(&self) -> ModelArtifact {
        ModelArtifact::new(self.models_dir(), self.model_name())
    }

    pub fn build_inputs(&self) -> BuildInputs {
        let or = |value: &Option<PathBuf>, default: &str| {
            value.clone().unwrap_or_else(|| PathBuf::from(default))
        };
        BuildInputs {
            config: or(&self.build.config, "config.yml"),
            domain: or(&self.build.domain, "domain.yml"),
            endpoints: or(&self.build.endpoints, "endpoints.yml"),
            credentials: or(&self.build.credentials, "credentials.yml"),
            data_dir: or(&self.build.data, "data"),
        }
    }

    pub fn build_privilege(&self) -> BuildPrivilege {
        self.build.privilege.unwrap_or_default()
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.build.monitor.unwrap_or(false)
    }

    pub fn engine_command(&self) -> &str {
        self.engine.command.as_deref().unwrap_or(DEFAULT_ENGINE_COMMAND)
    }

    pub fn trainer(&self) -> EngineCli {
        EngineCli::new(self.engine_command())
            .with_extra_args(self.engine.train_args.clone().unwrap_or_default())
    }

    pub fn runner(&self) -> EngineCli {
        EngineCli::new(self.engine_command())
            .with_extra_args(self.engine.run_args.clone().unwrap_or_default())
    }

    /// 啟動選項。API、CORS 與憑證/端點檔的預設值與容器部署一致，除錯預設關閉。
    pub fn serve_options(&self) -> ServeOptions {
        let serve = &self.serve;
        let inputs = self.build_inputs();
        ServeOptions {
            host: serve.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string()),
            cors: Some(serve.cors.clone().unwrap_or_else(|| "*".to_string()))
                .filter(|c| !c.is_empty()),
            enable_api: serve.enable_api.unwrap_or(true),
            credentials: Some(serve.credentials.clone().unwrap_or(inputs.credentials))
                .filter(|p| !p.as_os_str().is_empty()),
            endpoints: Some(serve.endpoints.clone().unwrap_or(inputs.endpoints))
                .filter(|p| !p.as_os_str().is_empty()),
            debug: serve.debug.unwrap_or(false),
            log_file: serve.log_file.clone(),
            artifact: self.artifact(),
            launch_mode: serve.launch_mode.unwrap_or_default(),
            shutdown_grace_seconds: serve
                .shutdown_grace_seconds
                .unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECONDS),
        }
    }

    /// 設定檔優先，其次是 ENGINE_URL，最後是預設值
    pub fn status_url(&self, env: &dyn EnvSource) -> String {
        self.status
            .url
            .clone()
            .or_else(|| env.var(STATUS_URL_ENV_VAR))
            .unwrap_or_else(|| DEFAULT_STATUS_URL.to_string())
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_secs(self.status.timeout_seconds.unwrap_or(5))
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("engine.command", self.engine_command())?;
        validation::validate_file_stem("build.model_name", self.model_name())?;

        let models_dir = self.models_dir();
        validation::validate_path("build.models_dir", &models_dir.to_string_lossy())?;

        let inputs = self.build_inputs();
        for (name, path, _) in inputs.required() {
            validation::validate_path(&format!("build.{}", name), &path.to_string_lossy())?;
        }

        if let Some(host) = &self.serve.host {
            validation::validate_non_empty_string("serve.host", host)?;
        }
        if let Some(log_file) = &self.serve.log_file {
            validation::validate_path("serve.log_file", &log_file.to_string_lossy())?;
        }
        if let Some(grace) = self.serve.shutdown_grace_seconds {
            validation::validate_range("serve.shutdown_grace_seconds", grace, 1, 300)?;
        }
        if let Some(url) = &self.status.url {
            validation::validate_url("status.url", url)?;
        }
        if let Some(timeout) = self.status.timeout_seconds {
            validation::validate_range("status.timeout_seconds", timeout, 1, 120)?;
        }

        Ok(())
    }
}

impl Validate for DeployConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
