// Adapters layer: concrete implementations for external systems (process env, engine CLI, http)

pub mod engine_cli;
pub mod env;
pub mod status;
