use crate::config::toml_config::DeployConfig;
use crate::domain::model::{BuildPrivilege, LaunchMode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "dialog-deploy")]
#[command(about = "Train a dialogue model at image build time, then serve it on the injected port")]
pub struct CliConfig {
    /// Path to deploy.toml (defaults to ./deploy.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose launcher output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit launcher logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Train the model artifact under its fixed name
    Build(BuildArgs),
    /// Start the engine HTTP server for the trained artifact
    Serve(ServeArgs),
    /// Print the port the server would bind right now
    ResolvePort,
    /// Check that a running engine answers HTTP requests
    Status(StatusArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    /// Override the fixed artifact name
    #[arg(long)]
    pub model_name: Option<String>,

    /// Directory the artifact is written to
    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Fail unless the build runs as root
    #[arg(long)]
    pub require_root: bool,

    /// Log CPU and memory usage around training
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub monitor: Option<bool>,

    /// Check inputs and print the training command without running it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub model_name: Option<String>,

    #[arg(long)]
    pub models_dir: Option<PathBuf>,

    /// Accept public inbound API calls (`--enable-api false` turns it off)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub enable_api: Option<bool>,

    /// Cross-origin policy passed to the engine
    #[arg(long)]
    pub cors: Option<String>,

    #[arg(long)]
    pub credentials: Option<PathBuf>,

    #[arg(long)]
    pub endpoints: Option<PathBuf>,

    /// Increase engine log verbosity
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub debug: Option<bool>,

    /// Write engine logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Keep the launcher as parent and relay termination signals
    #[arg(long)]
    pub supervise: bool,

    /// Resolve configuration and print the server command without starting it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct StatusArgs {
    /// Engine base URL (defaults to ENGINE_URL or http://localhost:5005)
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub timeout_seconds: Option<u64>,
}

impl BuildArgs {
    /// 命令列參數覆蓋設定檔
    pub fn apply(&self, config: &mut DeployConfig) {
        if let Some(name) = &self.model_name {
            config.build.model_name = Some(name.clone());
        }
        if let Some(dir) = &self.models_dir {
            config.build.models_dir = Some(dir.clone());
        }
        if self.require_root {
            config.build.privilege = Some(BuildPrivilege::RequireRoot);
        }
        if let Some(monitor) = self.monitor {
            config.build.monitor = Some(monitor);
        }
    }
}

impl ServeArgs {
    pub fn apply(&self, config: &mut DeployConfig) {
        if let Some(name) = &self.model_name {
            config.build.model_name = Some(name.clone());
        }
        if let Some(dir) = &self.models_dir {
            config.build.models_dir = Some(dir.clone());
        }

        let serve = &mut config.serve;
        if let Some(enable_api) = self.enable_api {
            serve.enable_api = Some(enable_api);
        }
        if let Some(cors) = &self.cors {
            serve.cors = Some(cors.clone());
        }
        if let Some(credentials) = &self.credentials {
            serve.credentials = Some(credentials.clone());
        }
        if let Some(endpoints) = &self.endpoints {
            serve.endpoints = Some(endpoints.clone());
        }
        if let Some(debug) = self.debug {
            serve.debug = Some(debug);
        }
        if let Some(log_file) = &self.log_file {
            serve.log_file = Some(log_file.clone());
        }
        if self.supervise {
            serve.launch_mode = Some(LaunchMode::Supervise);
        }
    }
}

impl StatusArgs {
    pub fn apply(&self, config: &mut DeployConfig) {
        if let Some(url) = &self.url {
            config.status.url = Some(url.clone());
        }
        if let Some(timeout) = self.timeout_seconds {
            config.status.timeout_seconds = Some(timeout);
        }
    }
}
