//! Durable evidence storage.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::{Result, ScrapeError};

/// Persists evidence artifacts under a namespaced key.
#[async_trait]
pub trait EvidenceStore: Send + Sync {
    /// Upload the artifact at `path` under `namespace/<file name>` and
    /// return the remote location. Not retried; a rejected upload aborts
    /// the scrape pass.
    async fn archive(&self, namespace: &str, path: &Path) -> Result<String>;
}

/// S3-backed evidence store.
pub struct S3EvidenceStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3EvidenceStore {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            "slotwatch-env",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl EvidenceStore for S3EvidenceStore {
    async fn archive(&self, namespace: &str, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ScrapeError::Storage(format!("artifact has no file name: {}", path.display()))
            })?;
        let contents = tokio::fs::read(path).await?;

        let key = format!("{namespace}/{name}");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(contents))
            .send()
            .await
            .map_err(|e| ScrapeError::Storage(DisplayErrorContext(e).to_string()))?;

        let location = format!("s3://{}/{}", self.bucket, key);
        info!(location = %location, "uploaded evidence artifact");
        Ok(location)
    }
}
