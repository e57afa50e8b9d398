use crate::domain::model::{BuildInputs, LaunchMode, ModelArtifact, ServiceConfig};
use crate::domain::ports::{ServerRunner, Trainer};
use crate::utils::error::{DeployError, Result};
use crate::utils::monitor::send_terminate;
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};

pub const DEFAULT_ENGINE_COMMAND: &str = "rasa";

/// 以命令列呼叫外部對話引擎。所有參數都是字面值，不經過 shell。
#[derive(Debug, Clone)]
pub struct EngineCli {
    command: String,
    extra_args: Vec<String>,
}

impl EngineCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn train_args(&self, inputs: &BuildInputs, artifact: &ModelArtifact) -> Vec<String> {
        let mut args = vec![
            "train".to_string(),
            "--config".to_string(),
            inputs.config.display().to_string(),
            "--domain".to_string(),
            inputs.domain.display().to_string(),
            "--data".to_string(),
            inputs.data_dir.display().to_string(),
            "--out".to_string(),
            artifact.models_dir().display().to_string(),
            "--fixed-model-name".to_string(),
            artifact.name().to_string(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args
    }

    pub fn run_args(&self, config: &ServiceConfig) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--model".to_string(),
            config.artifact.path().display().to_string(),
            "--interface".to_string(),
            config.host.clone(),
            "--port".to_string(),
            config.port.to_string(),
        ];
        if config.enable_api {
            args.push("--enable-api".to_string());
        }
        if let Some(cors) = &config.cors {
            args.push("--cors".to_string());
            args.push(cors.clone());
        }
        if let Some(credentials) = &config.credentials {
            args.push("--credentials".to_string());
            args.push(credentials.display().to_string());
        }
        if let Some(endpoints) = &config.endpoints {
            args.push("--endpoints".to_string());
            args.push(endpoints.display().to_string());
        }
        if let Some(log_file) = &config.log_file {
            args.push("--log-file".to_string());
            args.push(log_file.display().to_string());
        }
        if config.debug {
            args.push("--debug".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn with_program(&self, args: Vec<String>) -> Vec<String> {
        std::iter::once(self.command.clone()).chain(args).collect()
    }

    fn spawn_error(&self, e: std::io::Error) -> DeployError {
        if e.kind() == std::io::ErrorKind::NotFound {
            DeployError::ConfigError {
                message: format!("engine command '{}' not found in PATH", self.command),
            }
        } else {
            DeployError::IoError(e)
        }
    }

    #[cfg(unix)]
    fn exec_server(&self, config: &ServiceConfig) -> Result<()> {
        use std::os::unix::process::CommandExt;

        tracing::info!("🔁 Handing process over to '{}'", self.command);
        // exec 只在失敗時返回
        let err = std::process::Command::new(&self.command)
            .args(self.run_args(config))
            .exec();
        Err(self.spawn_error(err))
    }

    #[cfg(not(unix))]
    fn exec_server(&self, _config: &ServiceConfig) -> Result<()> {
        unreachable!("exec mode is only used on unix")
    }

    async fn supervise_server(&self, config: &ServiceConfig) -> Result<()> {
        // 先註冊訊號處理再啟動子程序，否則空窗期的 SIGTERM 會讓伺服器變成孤兒
        let mut shutdown = ShutdownSignal::install();

        let mut child = Command::new(&self.command)
            .args(self.run_args(config))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        tracing::info!("👀 Supervising server pid {:?}", child.id());

        let exited = tokio::select! {
            status = child.wait() => Some(status?),
            signal = shutdown.recv() => {
                tracing::info!("🛑 Received {}, stopping server", signal);
                None
            }
        };

        match exited {
            Some(status) => server_exit(status),
            None => {
                stop_child(&mut child, Duration::from_secs(config.shutdown_grace_seconds)).await
            }
        }
    }
}

impl Default for EngineCli {
    fn default() -> Self {
        Self::new(DEFAULT_ENGINE_COMMAND)
    }
}

#[async_trait]
impl Trainer for EngineCli {
    async fn train(&self, inputs: &BuildInputs, artifact: &ModelArtifact) -> Result<()> {
        let status = Command::new(&self.command)
            .args(self.train_args(inputs, artifact))
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| DeployError::TrainingFailure {
                message: format!("cannot start '{}': {}", self.command, e),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DeployError::TrainingFailure {
                message: format!("'{} train' exited with {}", self.command, status),
            })
        }
    }

    fn describe(&self, inputs: &BuildInputs, artifact: &ModelArtifact) -> Vec<String> {
        self.with_program(self.train_args(inputs, artifact))
    }
}

#[async_trait]
impl ServerRunner for EngineCli {
    async fn run(&self, config: &ServiceConfig) -> Result<()> {
        match config.launch_mode {
            LaunchMode::Exec if cfg!(unix) => self.exec_server(config),
            LaunchMode::Exec => {
                tracing::warn!("⚠️ Exec mode is unavailable on this platform, supervising instead");
                self.supervise_server(config).await
            }
            LaunchMode::Supervise => self.supervise_server(config).await,
        }
    }

    fn describe(&self, config: &ServiceConfig) -> Vec<String> {
        self.with_program(self.run_args(config))
    }
}

fn server_exit(status: ExitStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(DeployError::ServerExited {
            code: status.code(),
        })
    }
}

/// 先請子程序自行結束，逾時才強制終止。由訊號觸發的停止一律視為正常結束。
async fn stop_child(child: &mut Child, grace: Duration) -> Result<()> {
    if let Some(pid) = child.id() {
        if !send_terminate(pid) {
            tracing::warn!("⚠️ Could not forward SIGTERM to pid {}", pid);
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => {
            tracing::info!("Server exited with {}", status?);
        }
        Err(_) => {
            tracing::warn!("⚠️ Server did not stop within {:?}, killing it", grace);
            child.kill().await?;
        }
    }
    Ok(())
}

/// SIGTERM 與 SIGINT 的監聽器，建立時即向 runtime 註冊
struct ShutdownSignal {
    #[cfg(unix)]
    terminate: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    interrupt: Option<tokio::signal::unix::Signal>,
}

impl ShutdownSignal {
    #[cfg(unix)]
    fn install() -> Self {
        use tokio::signal::unix::{signal, SignalKind};

        let listen = |kind: SignalKind, name: &str| match signal(kind) {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::error!("Failed to listen for {}: {}", name, e);
                None
            }
        };

        Self {
            terminate: listen(SignalKind::terminate(), "SIGTERM"),
            interrupt: listen(SignalKind::interrupt(), "SIGINT"),
        }
    }

    #[cfg(not(unix))]
    fn install() -> Self {
        Self {}
    }

    /// 等待下一個終止訊號，回傳訊號名稱
    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = recv_or_pending(self.terminate.as_mut()) => "SIGTERM",
            _ = recv_or_pending(self.interrupt.as_mut()) => "SIGINT",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        "SIGINT"
    }
}

#[cfg(unix)]
async fn recv_or_pending(stream: Option<&mut tokio::signal::unix::Signal>) {
    match stream {
        Some(stream) => {
            stream.recv().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn service_config() -> ServiceConfig {
        ServiceConfig {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors: Some("*".to_string()),
            enable_api: true,
            credentials: Some(PathBuf::from("credentials.yml")),
            endpoints: Some(PathBuf::from("endpoints.yml")),
            debug: false,
            log_file: None,
            artifact: ModelArtifact::new("models", "model"),
            launch_mode: LaunchMode::Exec,
            shutdown_grace_seconds: 10,
        }
    }

    #[test]
    fn test_run_args_embed_literal_port() {
        let engine = EngineCli::default();
        let argv = ServerRunner::describe(&engine, &service_config());

        assert_eq!(argv[0], "rasa");
        assert_eq!(argv[1], "run");
        let port_idx = argv.iter().position(|a| a == "--port").unwrap();
        assert_eq!(argv[port_idx + 1], "8080");
        assert!(argv.contains(&"--enable-api".to_string()));
        assert!(!argv.iter().any(|a| a.contains('$')));
        assert!(!argv.contains(&"--debug".to_string()));
        assert!(!argv.contains(&"--log-file".to_string()));
    }

    #[test]
    fn test_optional_flags_are_independent() {
        let engine = EngineCli::default();
        let mut config = service_config();
        config.enable_api = false;
        config.cors = None;
        config.credentials = None;
        config.endpoints = None;
        config.debug = true;
        config.log_file = Some(PathBuf::from("/var/log/engine.log"));

        let argv = engine.run_args(&config);
        assert!(!argv.contains(&"--enable-api".to_string()));
        assert!(!argv.contains(&"--cors".to_string()));
        assert!(!argv.contains(&"--credentials".to_string()));
        assert!(argv.contains(&"--debug".to_string()));
        let idx = argv.iter().position(|a| a == "--log-file").unwrap();
        assert_eq!(argv[idx + 1], "/var/log/engine.log");
    }

    #[test]
    fn test_train_args_use_fixed_model_name() {
        let engine = EngineCli::new("engine").with_extra_args(vec!["--quiet".to_string()]);
        let inputs = BuildInputs {
            config: PathBuf::from("config.yml"),
            domain: PathBuf::from("domain.yml"),
            endpoints: PathBuf::from("endpoints.yml"),
            credentials: PathBuf::from("credentials.yml"),
            data_dir: PathBuf::from("data"),
        };
        let artifact = ModelArtifact::new("models", "bot");

        let argv = Trainer::describe(&engine, &inputs, &artifact);
        assert_eq!(&argv[..2], &["engine".to_string(), "train".to_string()]);
        let idx = argv.iter().position(|a| a == "--fixed-model-name").unwrap();
        assert_eq!(argv[idx + 1], "bot");
        assert_eq!(argv.last().unwrap(), "--quiet");
    }

    #[tokio::test]
    async fn test_missing_engine_command_is_training_failure() {
        let engine = EngineCli::new("definitely-not-an-engine-binary");
        let inputs = BuildInputs {
            config: PathBuf::from("config.yml"),
            domain: PathBuf::from("domain.yml"),
            endpoints: PathBuf::from("endpoints.yml"),
            credentials: PathBuf::from("credentials.yml"),
            data_dir: PathBuf::from("data"),
        };
        let artifact = ModelArtifact::new("models", "model");

        let result = engine.train(&inputs, &artifact).await;
        assert!(matches!(result, Err(DeployError::TrainingFailure { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_child_terminates_within_grace() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = Command::new("sleep")
            .arg("30")
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        let grace = Duration::from_secs(10);
        let started = std::time::Instant::now();
        stop_child(&mut child, grace).await.unwrap();

        // SIGTERM 直接送達，不必等到寬限期結束再強制終止
        assert!(started.elapsed() < Duration::from_secs(5));
        let status = child.try_wait().unwrap().expect("child should have exited");
        assert_eq!(status.signal(), Some(15));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_shutdown_signal_is_registered_before_it_arrives() {
        let mut shutdown = ShutdownSignal::install();
        assert!(send_terminate(std::process::id()));

        let signal = tokio::time::timeout(Duration::from_secs(5), shutdown.recv())
            .await
            .expect("SIGTERM should be delivered to the listener");
        assert_eq!(signal, "SIGTERM");
    }
}
