use super::{BackendKind, StorageBackend, StorageError};
use async_trait::async_trait;
use dashmap::DashMap;

/// In-memory storage backend using concurrent hashmap.
///
/// Data is volatile and lost on shutdown. Useful as a stub in tests
/// and for scratch users that never need persistence.
pub struct MemoryStorage {
    files: DashMap<String, Vec<u8>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            files: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn upload(&self, file_name: &str, data: &[u8]) -> Result<(), StorageError> {
        self.files.insert(file_name.to_owned(), data.to_vec());
        Ok(())
    }

    async fn download(&self, file_name: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .get(file_name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound(file_name.to_string()))
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
