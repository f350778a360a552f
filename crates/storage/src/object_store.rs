//! Object storage interface for mirrored archives and composites (MinIO/S3 compatible).

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use object_store::{
    aws::AmazonS3Builder, memory::InMemory, path::Path, Attribute, AttributeValue, Attributes,
    GetOptions, ObjectStore, PutOptions,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use aorc_common::{AorcError, AorcResult};

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3/MinIO endpoint URL
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// AWS region (use "us-east-1" for MinIO)
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://minio:9000".to_string(),
            bucket: "tempest".to_string(),
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            region: "us-east-1".to_string(),
            allow_http: true,
        }
    }
}

/// Object storage client for the mirror and composite buckets.
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl ObjectStorage {
    /// Create a new S3-backed client from config.
    pub fn new(config: &ObjectStorageConfig) -> AorcResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(&config.endpoint)
            .with_bucket_name(&config.bucket)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key)
            .with_region(&config.region);

        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| AorcError::StorageError(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self {
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    /// Create an in-memory client. Used by tests; supports object metadata.
    pub fn new_in_memory(bucket: &str) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            bucket: bucket.to_string(),
        }
    }

    /// The `s3://` URI for a key in this bucket.
    pub fn uri(&self, path: &str) -> String {
        format!("s3://{}/{}", self.bucket, path)
    }

    /// Write bytes to a path in the bucket.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> AorcResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| AorcError::StorageError(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Write bytes with custom key-value metadata attached to the object.
    #[instrument(skip(self, data, metadata), fields(bucket = %self.bucket, path = %path))]
    pub async fn put_with_metadata(
        &self,
        path: &str,
        data: Bytes,
        metadata: &BTreeMap<String, String>,
    ) -> AorcResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), keys = metadata.len(), "Writing object with metadata");

        let mut attributes = Attributes::new();
        for (key, value) in metadata {
            attributes.insert(
                Attribute::Metadata(Cow::Owned(key.clone())),
                AttributeValue::from(value.clone()),
            );
        }

        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&location, data.into(), options)
            .await
            .map_err(|e| AorcError::StorageError(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a path.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> AorcResult<Bytes> {
        let location = Path::from(path);

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| AorcError::StorageError(format!("Failed to read {}: {}", path, e)))?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| AorcError::StorageError(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Read the custom metadata attached to an object.
    pub async fn metadata(&self, path: &str) -> AorcResult<BTreeMap<String, String>> {
        let location = Path::from(path);

        let options = GetOptions {
            head: true,
            ..Default::default()
        };

        let result = self
            .store
            .get_opts(&location, options)
            .await
            .map_err(|e| AorcError::StorageError(format!("Failed to head {}: {}", path, e)))?;

        let mut metadata = BTreeMap::new();
        for (attribute, value) in result.attributes.iter() {
            if let Attribute::Metadata(key) = attribute {
                metadata.insert(key.to_string(), value.to_string());
            }
        }

        Ok(metadata)
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> AorcResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(AorcError::StorageError(format!(
                "Failed to check {}: {}",
                path, e
            ))),
        }
    }

    /// List object keys with a given prefix.
    pub async fn list(&self, prefix: &str) -> AorcResult<Vec<String>> {
        use futures::TryStreamExt;

        let prefix_path = Path::from(prefix);
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| AorcError::StorageError(format!("List failed: {}", e)))?
        {
            paths.push(meta.location.to_string());
        }

        Ok(paths)
    }

    /// Delete an object.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn delete(&self, path: &str) -> AorcResult<()> {
        let location = Path::from(path);

        self.store
            .delete(&location)
            .await
            .map_err(|e| AorcError::StorageError(format!("Failed to delete {}: {}", path, e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let storage = ObjectStorage::new_in_memory("test-bucket");
        storage
            .put("mirrors/a.zip", Bytes::from_static(b"payload"))
            .await
            .unwrap();

        assert!(storage.exists("mirrors/a.zip").await.unwrap());
        assert!(!storage.exists("mirrors/missing.zip").await.unwrap());

        let data = storage.get("mirrors/a.zip").await.unwrap();
        assert_eq!(&data[..], b"payload");
    }

    #[tokio::test]
    async fn test_metadata_roundtrip() {
        let storage = ObjectStorage::new_in_memory("test-bucket");

        let mut meta = BTreeMap::new();
        meta.insert("source_uri".to_string(), "https://host/a.zip".to_string());
        meta.insert("ref_date".to_string(), "1979-02-01".to_string());

        storage
            .put_with_metadata("mirrors/a.zip", Bytes::from_static(b"payload"), &meta)
            .await
            .unwrap();

        let read_back = storage.metadata("mirrors/a.zip").await.unwrap();
        assert_eq!(read_back, meta);
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let storage = ObjectStorage::new_in_memory("test-bucket");
        storage.put("mirrors/a", Bytes::from_static(b"1")).await.unwrap();
        storage.put("mirrors/b", Bytes::from_static(b"2")).await.unwrap();
        storage.put("composites/c", Bytes::from_static(b"3")).await.unwrap();

        let mut keys = storage.list("mirrors").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["mirrors/a".to_string(), "mirrors/b".to_string()]);
    }

    #[test]
    fn test_uri() {
        let storage = ObjectStorage::new_in_memory("tempest");
        assert_eq!(storage.uri("mirrors/a.zip"), "s3://tempest/mirrors/a.zip");
    }
}
