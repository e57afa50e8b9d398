use anyhow::Result;
use async_trait::async_trait;
use dialog_deploy::core::launcher::ServeOptions;
use dialog_deploy::domain::model::{LaunchMode, ModelArtifact, ServiceConfig};
use dialog_deploy::domain::ports::ServerRunner;
use dialog_deploy::{DeployError, EngineCli, MapEnv, ServiceLauncher};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// 記錄收到的設定，不真的啟動伺服器
#[derive(Clone, Default)]
struct RecordingRunner {
    launched: Arc<Mutex<Vec<ServiceConfig>>>,
}

impl RecordingRunner {
    fn launched(&self) -> Vec<ServiceConfig> {
        self.launched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerRunner for RecordingRunner {
    async fn run(&self, config: &ServiceConfig) -> dialog_deploy::Result<()> {
        self.launched.lock().unwrap().push(config.clone());
        Ok(())
    }

    fn describe(&self, config: &ServiceConfig) -> Vec<String> {
        vec!["fake".to_string(), "run".to_string(), config.port.to_string()]
    }
}

fn trained_artifact(dir: &TempDir) -> ModelArtifact {
    let artifact = ModelArtifact::new(dir.path().join("models"), "model");
    std::fs::create_dir_all(artifact.models_dir()).unwrap();
    std::fs::write(artifact.path(), b"trained").unwrap();
    artifact
}

/// 取得目前沒有被佔用的埠
fn free_port() -> u16 {
    let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
    listener.local_addr().unwrap().port()
}

fn options(artifact: ModelArtifact) -> ServeOptions {
    let mut options = ServeOptions::new(artifact);
    options.host = "127.0.0.1".to_string();
    options
}

#[tokio::test]
async fn test_valid_override_is_bound_exactly() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let port = free_port();
    let runner = RecordingRunner::default();
    let launcher = ServiceLauncher::new(runner.clone());

    let env = MapEnv::from_pairs([("PORT", port.to_string())]);
    launcher.launch(options(trained_artifact(&temp_dir)), &env).await?;

    let launched = runner.launched();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].port, port);
    Ok(())
}

#[tokio::test]
async fn test_invalid_override_does_not_crash() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let launcher = ServiceLauncher::new(RecordingRunner::default());

    for raw in ["abc", "", "0", "70000", "-5", "80 80"] {
        let env = MapEnv::from_pairs([("PORT", raw)]);
        let (config, argv) = launcher.plan(options(trained_artifact(&temp_dir)), &env);
        assert_eq!(config.port, 5005, "PORT={:?}", raw);
        assert_eq!(argv.last().unwrap(), "5005");
    }
    Ok(())
}

#[tokio::test]
async fn test_missing_artifact_fails_before_port_check() -> Result<()> {
    let temp_dir = TempDir::new()?;
    // 佔用埠：若先檢查埠會得到 PortBindFailure
    let occupied = TcpListener::bind(("127.0.0.1", 0))?;
    let port = occupied.local_addr()?.port();

    let runner = RecordingRunner::default();
    let launcher = ServiceLauncher::new(runner.clone());
    let artifact = ModelArtifact::new(temp_dir.path().join("models"), "model");
    let env = MapEnv::from_pairs([("PORT", port.to_string())]);

    let err = launcher.launch(options(artifact), &env).await.unwrap_err();

    assert!(matches!(err, DeployError::ArtifactMissing { .. }));
    assert_eq!(err.exit_code(), 4);
    assert!(runner.launched().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_port_in_use_is_fatal() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let occupied = TcpListener::bind(("127.0.0.1", 0))?;
    let port = occupied.local_addr()?.port();

    let runner = RecordingRunner::default();
    let launcher = ServiceLauncher::new(runner.clone());
    let env = MapEnv::from_pairs([("PORT", port.to_string())]);

    let err = launcher
        .launch(options(trained_artifact(&temp_dir)), &env)
        .await
        .unwrap_err();

    match &err {
        DeployError::PortBindFailure { port: p, .. } => assert_eq!(*p, port),
        other => panic!("expected PortBindFailure, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 5);
    assert!(runner.launched().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_port_is_resolved_on_every_launch() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let runner = RecordingRunner::default();
    let launcher = ServiceLauncher::new(runner.clone());
    let artifact = trained_artifact(&temp_dir);

    let first = free_port();
    let mut env = MapEnv::from_pairs([("PORT", first.to_string())]);
    launcher.launch(options(artifact.clone()), &env).await?;

    let second = free_port();
    env.set("PORT", second.to_string());
    launcher.launch(options(artifact), &env).await?;

    let ports: Vec<u16> = runner.launched().iter().map(|c| c.port).collect();
    assert_eq!(ports, vec![first, second]);
    Ok(())
}

#[test]
fn test_engine_command_has_no_shell_layer() {
    let temp_dir = TempDir::new().unwrap();
    let launcher = ServiceLauncher::new(EngineCli::default());
    let mut opts = options(trained_artifact(&temp_dir));
    opts.launch_mode = LaunchMode::Supervise;
    opts.debug = true;

    let env = MapEnv::from_pairs([("PORT", "8080")]);
    let (config, argv) = launcher.plan(opts, &env);

    assert_eq!(config.port, 8080);
    assert_eq!(argv[0], "rasa");
    assert!(!argv.iter().any(|a| a == "sh" || a == "-c"));
    assert!(argv.windows(2).any(|w| w[0] == "--port" && w[1] == "8080"));
    assert!(argv.contains(&"--debug".to_string()));
}

#[cfg(unix)]
#[tokio::test]
async fn test_server_failure_propagates_exit_code() -> Result<()> {
    let temp_dir = TempDir::new()?;
    // `false` 忽略參數並以 1 結束，模擬啟動失敗的伺服器
    let launcher = ServiceLauncher::new(EngineCli::new("false"));
    let mut opts = options(trained_artifact(&temp_dir));
    opts.launch_mode = LaunchMode::Supervise;
    opts.credentials = None;
    opts.endpoints = None;

    let env = MapEnv::from_pairs([("PORT", free_port().to_string())]);
    let err = launcher.launch(opts, &env).await.unwrap_err();

    assert!(matches!(err, DeployError::ServerExited { code: Some(1) }));
    Ok(())
}
