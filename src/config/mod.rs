#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{BuildArgs, CliConfig, Command, ServeArgs, StatusArgs};
pub use toml_config::DeployConfig;
