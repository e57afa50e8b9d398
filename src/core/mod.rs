pub mod builder;
pub mod launcher;
pub mod port;

pub use crate::domain::model::{BuildInputs, ModelArtifact, PortResolution, ServiceConfig};
pub use crate::domain::ports::{EnvSource, ServerRunner, Trainer};
pub use crate::utils::error::Result;
