//! Process-wide routing table from user id to bound storage backend.

use crate::config::{Config, StorageConfig};
use crate::metrics::Metrics;
use crate::storage::{BackendFactory, BackendKind, StorageBackend, StorageError};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

static REGISTRY: OnceLock<StorageRegistry> = OnceLock::new();
static GLOBAL_CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

/// A user's active backend.
#[derive(Clone)]
pub struct Binding {
    pub kind: BackendKind,
    pub backend: Arc<dyn StorageBackend>,
}

/// Maps each user to exactly one backend and dispatches file operations.
///
/// Map shards are only locked for the lookup or replace of an entry. The
/// backend `Arc` is cloned out before any backend call is awaited, so slow
/// I/O for one user never holds up binds or lookups for another.
pub struct StorageRegistry {
    factory: BackendFactory,
    bindings: DashMap<String, Binding>,
    metrics: Arc<Metrics>,
}

impl StorageRegistry {
    /// A registry recording to the global meter provider.
    pub fn new(factory: BackendFactory) -> Self {
        Self::with_metrics(factory, Arc::new(Metrics::from_global()))
    }

    pub fn with_metrics(factory: BackendFactory, metrics: Arc<Metrics>) -> Self {
        Self {
            factory,
            bindings: DashMap::new(),
            metrics,
        }
    }

    /// The process-wide registry, configured from the environment on first use.
    pub fn global() -> &'static Self {
        REGISTRY.get_or_init(|| Self::construct_global(Config::from_env().storage))
    }

    /// Seed the process-wide registry with an explicit configuration.
    ///
    /// If the registry already exists it is returned unchanged.
    pub fn install(config: StorageConfig) -> &'static Self {
        let mut installed = false;
        let registry = REGISTRY.get_or_init(|| {
            installed = true;
            Self::construct_global(config)
        });
        if !installed {
            warn!("Storage registry already initialized, ignoring new configuration");
        }
        registry
    }

    /// How many times the process-wide registry has been constructed.
    pub fn global_constructions() -> usize {
        GLOBAL_CONSTRUCTIONS.load(Ordering::SeqCst)
    }

    fn construct_global(config: StorageConfig) -> Self {
        GLOBAL_CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
        info!(
            "File storage registry initialized (local root {:?}, s3 bucket {})",
            config.local_root, config.s3.bucket
        );
        Self::new(BackendFactory::new(config))
    }

    /// Bind `user_id` to a freshly built backend for `tag`, replacing any
    /// previous binding. Files stored through the old backend are not moved.
    pub async fn bind(&self, user_id: &str, tag: &str) -> Result<(), StorageError> {
        validate_user(user_id)?;
        let backend = self.factory.try_create(tag, user_id).await?;
        self.bind_backend(user_id, backend)
    }

    /// Bind `user_id` to an already constructed backend.
    pub fn bind_backend(
        &self,
        user_id: &str,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<(), StorageError> {
        validate_user(user_id)?;
        let kind = backend.kind();

        let previous = self
            .bindings
            .insert(user_id.to_string(), Binding { kind, backend });

        match previous {
            Some(old) => info!("User {} rebound from {} to {}", user_id, old.kind, kind),
            None => info!("User {} bound to {} storage", user_id, kind),
        }
        self.metrics.record_binding(kind);
        Ok(())
    }

    pub async fn upload(
        &self,
        user_id: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<(), StorageError> {
        validate_file_name(file_name)?;
        let binding = self.lookup(user_id)?;

        debug!(
            "Uploading {} ({} bytes) for {} via {}",
            file_name,
            data.len(),
            user_id,
            binding.kind
        );
        let metrics = &self.metrics;
        match binding.backend.upload(file_name, data).await {
            Ok(()) => {
                metrics.record_upload(binding.kind, data.len());
                Ok(())
            }
            Err(e) => {
                metrics.record_error(binding.kind, "upload");
                debug!("Upload of {} for {} failed: {}", file_name, user_id, e);
                Err(e)
            }
        }
    }

    pub async fn download(&self, user_id: &str, file_name: &str) -> Result<Vec<u8>, StorageError> {
        validate_file_name(file_name)?;
        let binding = self.lookup(user_id)?;

        debug!("Downloading {} for {} via {}", file_name, user_id, binding.kind);
        let metrics = &self.metrics;
        match binding.backend.download(file_name).await {
            Ok(data) => {
                metrics.record_download(binding.kind);
                Ok(data)
            }
            Err(e) => {
                metrics.record_error(binding.kind, "download");
                debug!("Download of {} for {} failed: {}", file_name, user_id, e);
                Err(e)
            }
        }
    }

    /// Tag of the backend currently bound to `user_id`.
    pub fn backend_type(&self, user_id: &str) -> Result<BackendKind, StorageError> {
        Ok(self.lookup(user_id)?.kind)
    }

    /// The backend currently bound to `user_id`.
    pub fn backend(&self, user_id: &str) -> Result<Arc<dyn StorageBackend>, StorageError> {
        Ok(self.lookup(user_id)?.backend)
    }

    pub fn is_bound(&self, user_id: &str) -> bool {
        self.bindings.contains_key(user_id)
    }

    /// All bound user ids, sorted.
    pub fn bound_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self.bindings.iter().map(|e| e.key().clone()).collect();
        users.sort();
        users
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn lookup(&self, user_id: &str) -> Result<Binding, StorageError> {
        self.bindings
            .get(user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NoBackendBound(user_id.to_string()))
    }
}

/// User ids become directory names for local storage, so anything that
/// could step outside the root is malformed.
fn validate_user(user_id: &str) -> Result<(), StorageError> {
    if user_id.trim().is_empty() {
        return Err(StorageError::InvalidArgument(
            "user id must not be empty".to_string(),
        ));
    }
    if user_id == "." || user_id == ".." || user_id.contains(['/', '\\', '\0']) {
        return Err(StorageError::InvalidArgument(format!(
            "malformed user id: {:?}",
            user_id
        )));
    }
    Ok(())
}

fn validate_file_name(file_name: &str) -> Result<(), StorageError> {
    if file_name.is_empty() {
        return Err(StorageError::InvalidArgument(
            "file name must not be empty".to_string(),
        ));
    }
    if file_name.contains('\0') {
        return Err(StorageError::InvalidArgument(format!(
            "file name contains a NUL byte: {:?}",
            file_name
        )));
    }
    Ok(())
}
