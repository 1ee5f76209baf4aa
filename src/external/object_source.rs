use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::ObjectStore;
use tracing::{debug, info};

use crate::config::StorageConnection;
use crate::errors::AppError;

/// Read-only view of one bucket.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    fn bucket(&self) -> &str;

    /// All keys in the bucket, in the store's listing order.
    async fn list_keys(&self) -> Result<Vec<String>, AppError>;

    async fn read_key(&self, key: &str) -> Result<Bytes, AppError>;
}

/// `ObjectSource` backed by any `object_store` implementation (S3, MinIO, in-memory).
pub struct ObjectStoreSource {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStoreSource {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Build an S3 client for `bucket` from a credential profile.
    pub fn s3(connection: &StorageConnection, bucket: &str) -> Result<Self, AppError> {
        let mut builder = AmazonS3Builder::new()
            .with_region(&connection.region)
            .with_bucket_name(bucket);

        if let Some(ref key) = connection.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(ref secret) = connection.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }

        if let Some(ref endpoint) = connection.endpoint {
            // object_store wants an absolute URL
            let endpoint_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                endpoint.clone()
            } else if connection.allow_http {
                format!("http://{}", endpoint)
            } else {
                format!("https://{}", endpoint)
            };
            builder = builder
                .with_endpoint(&endpoint_url)
                .with_virtual_hosted_style_request(false)
                .with_allow_http(connection.allow_http || endpoint_url.starts_with("http://"));
        }

        let store = builder.build()?;

        info!(
            "🪣 Object storage: s3://{} via profile '{}' (endpoint: {})",
            bucket,
            connection.profile,
            connection.endpoint.as_deref().unwrap_or("aws")
        );

        Ok(Self::new(Arc::new(store), bucket))
    }
}

#[async_trait]
impl ObjectSource for ObjectStoreSource {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_keys(&self) -> Result<Vec<String>, AppError> {
        let mut keys = Vec::new();
        let mut listing = self.store.list(None);

        while let Some(meta) = listing.try_next().await? {
            keys.push(meta.location.to_string());
        }

        debug!("Listed {} objects in bucket {}", keys.len(), self.bucket);
        Ok(keys)
    }

    async fn read_key(&self, key: &str) -> Result<Bytes, AppError> {
        let location = Path::parse(key).map_err(object_store::Error::from)?;
        let bytes = self.store.get(&location).await?.bytes().await?;
        debug!("Read {} bytes from s3://{}/{}", bytes.len(), self.bucket, key);
        Ok(bytes)
    }
}
