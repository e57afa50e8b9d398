use crate::core::port::resolve_port;
use crate::domain::model::{LaunchMode, ModelArtifact, PortResolution, ServiceConfig};
use crate::domain::ports::{EnvSource, ServerRunner};
use crate::utils::error::{DeployError, Result};
use std::net::TcpListener;
use std::path::PathBuf;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_SHUTDOWN_GRACE_SECONDS: u64 = 10;

/// 埠解析前的啟動選項 (來自設定檔與命令列)
#[derive(Debug, Clone)]
pub struct ServeOptions {
    pub host: String,
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

impl ServeOptions {
    pub fn new(artifact: ModelArtifact) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            cors: None,
            enable_api: false,
            credentials: None,
            endpoints: None,
            debug: false,
            log_file: None,
            artifact,
            launch_mode: LaunchMode::default(),
            shutdown_grace_seconds: DEFAULT_SHUTDOWN_GRACE_SECONDS,
        }
    }
}

impl ServiceConfig {
    /// 從選項與環境產生不可變的服務設定，埠在此時解析
    pub fn resolve(options: ServeOptions, env: &dyn EnvSource) -> (Self, PortResolution) {
        let resolution = resolve_port(env);
        let config = ServiceConfig {
            host: options.host,
            port: resolution.port(),
            cors: options.cors,
            enable_api: options.enable_api,
            credentials: options.credentials,
            endpoints: options.endpoints,
            debug: options.debug,
            log_file: options.log_file,
            artifact: options.artifact,
            launch_mode: options.launch_mode,
            shutdown_grace_seconds: options.shutdown_grace_seconds,
        };
        (config, resolution)
    }
}

/// 服務啟動器：解析設定、檢查產物、確認埠可用，然後把控制權交給伺服器
pub struct ServiceLauncher<R: ServerRunner> {
    runner: R,
}

impl<R: ServerRunner> ServiceLauncher<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// 只解析與描述，不啟動任何東西
    pub fn plan(&self, options: ServeOptions, env: &dyn EnvSource) -> (ServiceConfig, Vec<String>) {
        let (config, _) = ServiceConfig::resolve(options, env);
        let argv = self.runner.describe(&config);
        (config, argv)
    }

    pub async fn launch(&self, options: ServeOptions, env: &dyn EnvSource) -> Result<()> {
        let (config, _) = ServiceConfig::resolve(options, env);
        self.launch_resolved(&config).await
    }

    pub async fn launch_resolved(&self, config: &ServiceConfig) -> Result<()> {
        preflight(config)?;

        tracing::info!(
            "🚀 Starting server for model '{}' on {}:{} ({:?} mode)",
            config.artifact.name(),
            config.host,
            config.port,
            config.launch_mode
        );
        tracing::debug!("Server command: {}", self.runner.describe(config).join(" "));

        self.runner.run(config).await?;

        tracing::info!("👋 Server stopped");
        Ok(())
    }
}

/// 啟動前檢查。順序固定：產物 → 執行期檔案 → 埠。
pub fn preflight(config: &ServiceConfig) -> Result<()> {
    if !config.artifact.is_present() {
        return Err(DeployError::ArtifactMissing {
            path: config.artifact.path().display().to_string(),
        });
    }
    tracing::debug!("Model artifact found at {}", config.artifact.path().display());

    for (field, path) in [
        ("serve.credentials", &config.credentials),
        ("serve.endpoints", &config.endpoints),
    ] {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(DeployError::ConfigValidationError {
                    field: field.to_string(),
                    message: format!("file not found: {}", path.display()),
                });
            }
        }
    }

    check_port_available(&config.host, config.port)
}

/// 短暫綁定後立即釋放，讓無法綁定的埠在啟動伺服器前就失敗
pub fn check_port_available(host: &str, port: u16) -> Result<()> {
    match TcpListener::bind((host, port)) {
        Ok(listener) => {
            drop(listener);
            Ok(())
        }
        Err(source) => Err(DeployError::PortBindFailure { port, source }),
    }
}
