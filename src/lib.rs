pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::DeployConfig;

pub use adapters::engine_cli::EngineCli;
pub use adapters::env::{MapEnv, ProcessEnv};
pub use crate::core::{builder::ArtifactBuilder, launcher::ServiceLauncher};
pub use utils::error::{DeployError, Result};
