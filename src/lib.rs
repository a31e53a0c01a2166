pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::{BootstrapConfig, ReleaseOrder, Settings};
pub use errors::{BootError, ConfigError, ContainerError};
pub use infrastructure::{
    launch, BootState, Bootstrap, CloseFailure, Container, ContainerStats, Definition, Identity, Manager,
};
