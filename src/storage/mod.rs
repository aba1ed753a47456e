//! Storage backend implementations and abstractions.
//!
//! Provides pluggable per-user storage with local disk, S3 and memory backends.

pub mod local;
pub mod memory;
pub mod s3;
pub mod traits;

pub use traits::*;

use crate::config::StorageConfig;
use std::sync::Arc;
use tracing::{debug, warn};

/// Factory for creating backends from a type tag.
///
/// Each call returns a fresh instance namespaced to `user_id`; instances
/// share nothing with each other.
#[derive(Debug, Clone, Default)]
pub struct BackendFactory {
    config: StorageConfig,
}

impl BackendFactory {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Create a backend, treating unrecognized or empty tags as `local`.
    pub async fn create(&self, tag: &str, user_id: &str) -> Arc<dyn StorageBackend> {
        let kind = match tag.parse::<BackendKind>() {
            Ok(kind) => kind,
            Err(_) => {
                warn!("Unknown backend type {:?} for user {}, using local", tag, user_id);
                BackendKind::Local
            }
        };
        self.create_kind(kind, user_id).await
    }

    /// Create a backend, honoring `strict_backend_tags`.
    ///
    /// In strict mode an unrecognized tag is an `UnknownBackendType` error
    /// instead of a silent fallback.
    pub async fn try_create(
        &self,
        tag: &str,
        user_id: &str,
    ) -> Result<Arc<dyn StorageBackend>, StorageError> {
        if self.config.strict_backend_tags {
            let kind = tag.parse::<BackendKind>()?;
            Ok(self.create_kind(kind, user_id).await)
        } else {
            Ok(self.create(tag, user_id).await)
        }
    }

    pub async fn create_kind(&self, kind: BackendKind, user_id: &str) -> Arc<dyn StorageBackend> {
        debug!("Creating {} backend for user {}", kind, user_id);
        match kind {
            BackendKind::Local => {
                Arc::new(local::LocalDiskStorage::new(&self.config.local_root, user_id))
            }
            BackendKind::S3 => Arc::new(s3::S3Storage::new(&self.config.s3, user_id).await),
            BackendKind::Memory => Arc::new(memory::MemoryStorage::new()),
        }
    }
}
