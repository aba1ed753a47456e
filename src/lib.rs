pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod storage;
pub mod telemetry;

pub use config::{Config, S3Config, StorageConfig};
pub use registry::{Binding, StorageRegistry};
pub use storage::{BackendFactory, BackendKind, StorageBackend, StorageError};
