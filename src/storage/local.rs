use super::{BackendKind, StorageBackend, StorageError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, instrument};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
///
/// Files live under `root/<user_id>/<file_name>`. The user directory is
/// created on first upload.
pub struct LocalDiskStorage {
    dir: PathBuf,
}

impl LocalDiskStorage {
    pub fn new<P: AsRef<Path>>(root: P, user_id: &str) -> Self {
        Self {
            dir: root.as_ref().join(user_id),
        }
    }

    /// Directory holding this user's files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, file_name: &str) -> Result<PathBuf, StorageError> {
        let escapes = file_name.is_empty()
            || file_name == "."
            || file_name == ".."
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains('\0')
            || Path::new(file_name).is_absolute();
        if escapes {
            return Err(StorageError::InvalidArgument(format!(
                "file name must be a plain name: {:?}",
                file_name
            )));
        }
        Ok(self.dir.join(file_name))
    }

    /// Write to a sibling temp file, then rename over the target.
    async fn atomic_write(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        let tmp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("upload"),
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = fs::write(&tmp, data).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::BackendFailure(format!(
                "write {:?} failed: {}",
                tmp, e
            )));
        }
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StorageError::BackendFailure(format!(
                "rename to {:?} failed: {}",
                path, e
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for LocalDiskStorage {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn upload(&self, file_name: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.file_path(file_name)?;
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::BackendFailure(format!("create {:?}: {}", self.dir, e)))?;

        self.atomic_write(&path, data).await?;
        debug!("Wrote {} bytes to {:?}", data.len(), path);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download(&self, file_name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.file_path(file_name)?;

        match fs::read(&path).await {
            Ok(data) => {
                debug!("Read {} bytes from {:?}", data.len(), path);
                Ok(data)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(file_name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_roundtrip_under_user_dir() {
        let root = TempDir::new().unwrap();
        let storage = LocalDiskStorage::new(root.path(), "alice");

        storage.upload("notes.txt", b"hello disk").await.unwrap();

        let on_disk = std::fs::read(root.path().join("alice").join("notes.txt")).unwrap();
        assert_eq!(on_disk, b"hello disk");
        assert_eq!(storage.download("notes.txt").await.unwrap(), b"hello disk");
    }

    #[tokio::test]
    async fn test_local_overwrite_not_append() {
        let root = TempDir::new().unwrap();
        let storage = LocalDiskStorage::new(root.path(), "bob");

        storage.upload("f.bin", b"aaaaaaaa").await.unwrap();
        storage.upload("f.bin", b"bb").await.unwrap();

        assert_eq!(storage.download("f.bin").await.unwrap(), b"bb");

        let leftovers: Vec<_> = std::fs::read_dir(storage.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn test_local_missing_file_is_not_found() {
        let root = TempDir::new().unwrap();
        let storage = LocalDiskStorage::new(root.path(), "carol");

        let err = storage.download("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_local_users_are_isolated() {
        let root = TempDir::new().unwrap();
        let a = LocalDiskStorage::new(root.path(), "a");
        let b = LocalDiskStorage::new(root.path(), "b");

        a.upload("shared-name", b"from a").await.unwrap();
        assert!(b.download("shared-name").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_local_rejects_path_escape() {
        let root = TempDir::new().unwrap();
        let storage = LocalDiskStorage::new(root.path(), "dave");

        for name in ["../etc", "..", "a/b", "/abs", "a\0b"] {
            let err = storage.upload(name, b"x").await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidArgument(_)), "{:?}", name);
            let err = storage.download(name).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidArgument(_)), "{:?}", name);
        }
        assert!(!storage.dir().exists());
    }
}
