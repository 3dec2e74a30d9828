//! Storage repository
//!
//! Answers whether an object exists in a bucket. A missing object is a
//! normal answer, not an error.

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use tracing::{debug, info};

/// Repository trait for object existence checks
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Checks whether `key` exists in `bucket`
    ///
    /// # Returns
    /// `Ok(false)` when storage reports the object as not found, and an
    /// error for every other failure
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;
}

/// S3 implementation of ObjectStorage
pub struct S3ObjectStorage {
    client: Client,
}

impl S3ObjectStorage {
    /// Creates a client for `region` using the default AWS credential chain
    pub async fn connect(region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        info!("S3 client initialized: region={}", region);

        Self {
            client: Client::new(&config),
        }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let result = self.client.head_object().bucket(bucket).key(key).send().await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    debug!("Object not found: bucket={} key={}", bucket, key);
                    return Ok(false);
                }

                anyhow::bail!(
                    "Failed to check key exists bucket={} key={}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&err)
                )
            }
        }
    }
}
