// Domain layer: core models and ports (interfaces). No process or network access here.

pub mod model;
pub mod ports;
