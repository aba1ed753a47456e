use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// Tag identifying which backend variant serves a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Local,
    S3,
    Memory,
}

impl BackendKind {
    /// Canonical lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Local => "local",
            BackendKind::S3 => "s3",
            BackendKind::Memory => "memory",
        }
    }

    /// Resolve a tag, falling back to `Local` for anything unrecognized.
    pub fn from_tag_lenient(tag: &str) -> Self {
        tag.parse().unwrap_or(BackendKind::Local)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = StorageError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "local" | "localdisk" => Ok(BackendKind::Local),
            "s3" | "amazons3" => Ok(BackendKind::S3),
            "memory" => Ok(BackendKind::Memory),
            _ => Err(StorageError::UnknownBackendType(tag.to_string())),
        }
    }
}

/// Trait for pluggable file storage backends.
///
/// Each bound instance owns its own namespace. Implementations handle
/// their own concurrency control; the registry never holds a lock while
/// one of these calls is in flight.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Store `data` under `file_name`, replacing any previous contents.
    async fn upload(&self, file_name: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Fetch the bytes stored under `file_name`.
    ///
    /// Returns `StorageError::NotFound` if the name was never uploaded.
    async fn download(&self, file_name: &str) -> Result<Vec<u8>, StorageError>;

    /// Variant this instance was built as.
    fn kind(&self) -> BackendKind;
}

/// Errors that can occur during storage routing and backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("No storage backend bound for user: {0}")]
    NoBackendBound(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Backend failure: {0}")]
    BackendFailure(String),
    #[error("Unknown backend type: {0}")]
    UnknownBackendType(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }

    pub fn is_unbound(&self) -> bool {
        matches!(self, StorageError::NoBackendBound(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound(e.to_string())
        } else {
            StorageError::BackendFailure(format!("I/O error: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_case_insensitive() {
        assert_eq!("LOCAL".parse::<BackendKind>().unwrap(), BackendKind::Local);
        assert_eq!(" S3 ".parse::<BackendKind>().unwrap(), BackendKind::S3);
        assert_eq!("AmazonS3".parse::<BackendKind>().unwrap(), BackendKind::S3);
        assert_eq!("LocalDisk".parse::<BackendKind>().unwrap(), BackendKind::Local);
    }

    #[test]
    fn test_strict_parse_rejects_unknown() {
        let err = "ftp".parse::<BackendKind>().unwrap_err();
        assert!(matches!(err, StorageError::UnknownBackendType(ref t) if t == "ftp"));
        assert!("".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_lenient_falls_back_to_local() {
        assert_eq!(BackendKind::from_tag_lenient("ftp"), BackendKind::Local);
        assert_eq!(BackendKind::from_tag_lenient(""), BackendKind::Local);
        assert_eq!(BackendKind::from_tag_lenient("s3"), BackendKind::S3);
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let err: StorageError = std::io::Error::from(std::io::ErrorKind::NotFound).into();
        assert!(err.is_not_found());

        let err: StorageError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert!(matches!(err, StorageError::BackendFailure(_)));
    }
}
