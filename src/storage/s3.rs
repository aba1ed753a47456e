use super::{BackendKind, StorageBackend, StorageError};
use crate::config::S3Config;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, instrument};

/// Object-store backend issuing S3 put/get calls.
///
/// Every user gets a key namespace `<prefix><user_id>/` inside the
/// configured bucket. Building the client does no network I/O;
/// credentials come from the default AWS chain when first needed.
pub struct S3Storage {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    pub async fn new(config: &S3Config, user_id: &str) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self::with_client(
            Client::from_conf(builder.build()),
            config.bucket.clone(),
            format!("{}{}/", config.prefix, user_id),
        )
    }

    pub fn with_client(client: Client, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn key_path(&self, file_name: &str) -> String {
        format!("{}{}", self.prefix, file_name)
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    #[instrument(skip(self, data), fields(size = data.len()))]
    async fn upload(&self, file_name: &str, data: &[u8]) -> Result<(), StorageError> {
        let key = self.key_path(file_name);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| {
                StorageError::BackendFailure(format!("S3 put error: {}", DisplayErrorContext(&e)))
            })?;

        debug!("S3 PUT {}/{} ({} bytes)", self.bucket, key, data.len());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download(&self, file_name: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.key_path(file_name);

        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                if let SdkError::ServiceError(service_error) = &e {
                    if matches!(service_error.err(), GetObjectError::NoSuchKey(_)) {
                        return StorageError::NotFound(file_name.to_string());
                    }
                }
                StorageError::BackendFailure(format!("S3 get error: {}", DisplayErrorContext(&e)))
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::BackendFailure(format!("S3 body read error: {}", e)))?
            .into_bytes()
            .to_vec();

        debug!("S3 GET {}/{} ({} bytes)", self.bucket, key, data.len());
        Ok(data)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::retry::RetryConfig;
    use aws_sdk_s3::config::{Credentials, Region};
    use aws_sdk_s3::primitives::SdkBody;
    use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};

    fn replayed(status: u16, body: &'static str) -> (StaticReplayClient, S3Storage) {
        let http_client = StaticReplayClient::new(vec![ReplayEvent::new(
            http::Request::builder()
                .uri("https://files.s3.us-east-1.amazonaws.com/users/user2/photo.png")
                .body(SdkBody::empty())
                .unwrap(),
            http::Response::builder()
                .status(status)
                .body(SdkBody::from(body))
                .unwrap(),
        )]);
        let config = aws_sdk_s3::Config::builder()
            .behavior_version_latest()
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
            .region(Region::new("us-east-1"))
            .retry_config(RetryConfig::disabled())
            .http_client(http_client.clone())
            .build();
        let storage = S3Storage::with_client(
            Client::from_conf(config),
            "files".to_string(),
            "users/user2/".to_string(),
        );
        (http_client, storage)
    }

    #[tokio::test]
    async fn test_s3_keys_are_namespaced_by_user() {
        let config = S3Config {
            bucket: "files".to_string(),
            prefix: "users/".to_string(),
            ..S3Config::default()
        };
        let storage = S3Storage::new(&config, "user2").await;

        assert_eq!(storage.bucket(), "files");
        assert_eq!(storage.key_path("photo.png"), "users/user2/photo.png");
        assert_eq!(storage.kind(), BackendKind::S3);
    }

    #[tokio::test]
    async fn test_s3_download_returns_body() {
        let (http_client, storage) = replayed(200, "jpeg bytes");

        assert_eq!(storage.download("photo.png").await.unwrap(), b"jpeg bytes");
        let request = http_client.actual_requests().next().unwrap();
        assert!(request.uri().contains("users/user2/photo.png"), "{}", request.uri());
    }

    #[tokio::test]
    async fn test_s3_no_such_key_is_not_found() {
        let (_http_client, storage) = replayed(
            404,
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <Error>
              <Code>NoSuchKey</Code>
              <Message>The specified key does not exist.</Message>
              <Key>users/user2/photo.png</Key>
            </Error>"#,
        );

        let err = storage.download("photo.png").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(ref name) if name == "photo.png"));
    }

    #[tokio::test]
    async fn test_s3_access_denied_is_backend_failure() {
        let (_http_client, storage) = replayed(
            403,
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <Error>
              <Code>AccessDenied</Code>
              <Message>Access Denied</Message>
            </Error>"#,
        );

        let err = storage.download("photo.png").await.unwrap_err();
        assert!(matches!(err, StorageError::BackendFailure(ref m) if m.contains("AccessDenied")));
    }

    #[tokio::test]
    async fn test_s3_upload_failure_is_backend_failure() {
        let (_http_client, storage) = replayed(
            403,
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <Error>
              <Code>AccessDenied</Code>
              <Message>Access Denied</Message>
            </Error>"#,
        );

        let err = storage.upload("photo.png", b"jpeg").await.unwrap_err();
        assert!(matches!(err, StorageError::BackendFailure(_)));
    }
}
