//! S3 client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the bucket endpoint.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// S3 API endpoint URL
    pub endpoint_url: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region (default "auto" for S3-compatible providers)
    pub region: String,
}

impl BucketConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("BUCKET_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("BUCKET_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("BUCKET_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("BUCKET_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("BUCKET_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("BUCKET_SECRET_ACCESS_KEY not set"))?,
            region: std::env::var("BUCKET_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Build the public URL of an uploaded object.
pub fn public_url(endpoint_url: &str, bucket: &str, object_name: &str) -> String {
    format!(
        "{}/{}/{}",
        endpoint_url.trim_end_matches('/'),
        bucket,
        object_name
    )
}

/// Client for the S3-compatible bucket endpoint.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    endpoint_url: String,
}

impl S3Client {
    /// Create a new client from configuration.
    pub fn new(config: BucketConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "bucket-env",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            endpoint_url: config.endpoint_url,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self::new(BucketConfig::from_env()?))
    }

    /// Upload a file and make it publicly readable.
    ///
    /// Returns the public URL of the uploaded object.
    pub async fn upload_public(
        &self,
        path: impl AsRef<Path>,
        bucket: &str,
        object_name: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        let path = path.as_ref();
        debug!("Uploading {} to {}/{}", path.display(), bucket, object_name);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(object_name)
            .body(body)
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let url = public_url(&self.endpoint_url, bucket, object_name);
        info!("Uploaded {} to {}", path.display(), url);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_joins_parts() {
        assert_eq!(
            public_url("https://storage.example.com", "sadtalker", "a.mp4"),
            "https://storage.example.com/sadtalker/a.mp4"
        );
        // Trailing slash on the endpoint does not double up
        assert_eq!(
            public_url("https://storage.example.com/", "sadtalker", "a.mp4"),
            "https://storage.example.com/sadtalker/a.mp4"
        );
    }
}
