use crate::traits::{BoxedReader, DurableStore, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::borrow::Cow;
use std::collections::HashMap;
use tokio::io::AsyncReadExt;

/// S3-compatible durable store (AWS S3, MinIO, ...)
#[derive(Clone)]
pub struct S3DurableStore {
    store: AmazonS3,
    bucket: String,
}

impl S3DurableStore {
    /// Create a new S3DurableStore instance
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    ///
    /// Credentials are read from the standard `AWS_*` environment variables.
    pub fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(ref endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3DurableStore { store, bucket })
    }
}

fn put_attributes(content_type: &str, metadata: &HashMap<String, String>) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        Attribute::ContentType,
        AttributeValue::from(content_type.to_string()),
    );
    for (key, value) in metadata {
        attributes.insert(
            Attribute::Metadata(Cow::Owned(key.clone())),
            AttributeValue::from(value.clone()),
        );
    }
    attributes
}

#[async_trait]
impl DurableStore for S3DurableStore {
    async fn put(
        &self,
        key: &str,
        mut reader: BoxedReader,
        size: u64,
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> StorageResult<()> {
        let start = std::time::Instant::now();

        // Single put: the whole object is buffered before upload.
        let mut buffer = Vec::with_capacity(usize::try_from(size).unwrap_or_default());
        reader.read_to_end(&mut buffer).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to read from stream: {}", e))
        })?;

        if buffer.len() as u64 != size {
            return Err(StorageError::UploadFailed(format!(
                "Expected {} bytes for {}, read {}",
                size,
                key,
                buffer.len()
            )));
        }

        let location = Path::from(key);
        let options = PutOptions {
            attributes: put_attributes(content_type, metadata),
            ..Default::default()
        };

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(Bytes::from(buffer)), options)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Durable store upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Durable store upload successful"
        );

        Ok(())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_attributes_carry_content_type_and_metadata() {
        let mut metadata = HashMap::new();
        metadata.insert("originalName".to_string(), "report.pdf".to_string());

        let attributes = put_attributes("application/pdf", &metadata);
        assert_eq!(attributes.len(), 2);
        assert_eq!(
            attributes.get(&Attribute::ContentType).map(|v| v.as_ref()),
            Some("application/pdf")
        );
        assert_eq!(
            attributes
                .get(&Attribute::Metadata(Cow::Borrowed("originalName")))
                .map(|v| v.as_ref()),
            Some("report.pdf")
        );
    }

    #[test]
    fn test_new_with_custom_endpoint() {
        let store = S3DurableStore::new(
            "uploads".to_string(),
            "us-east-1".to_string(),
            Some("http://localhost:9000".to_string()),
        )
        .unwrap();
        assert_eq!(store.bucket(), "uploads");
    }
}
