//! S3-backed object store for staging artifacts.

use async_trait::async_trait;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use tracing::info;

use crate::error::{ReleaseError, Result};
use crate::provider::ObjectOps;

/// Object store backed by S3.
#[derive(Debug, Clone)]
pub struct S3Objects {
    /// SDK client.
    client: Client,
}

impl S3Objects {
    /// Creates an adapter from a resolved session.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectOps for S3Objects {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body.into())
            .send()
            .await
            .map_err(|e| ReleaseError::ObjectStore {
                bucket: bucket.to_string(),
                cause: e.into_service_error().to_string(),
            })?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ReleaseError::ObjectStore {
                bucket: bucket.to_string(),
                cause: e.into_service_error().to_string(),
            })?;

        let bytes = output.body.collect().await.map_err(|e| {
            ReleaseError::ObjectStore {
                bucket: bucket.to_string(),
                cause: format!("failed to read object body: {e}"),
            }
        })?;

        Ok(bytes.to_vec())
    }

    async fn ensure_bucket(&self, bucket: &str, region: &str) -> Result<()> {
        let head = self.client.head_bucket().bucket(bucket).send().await;

        match head {
            Ok(_) => Ok(()),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if !service_err.is_not_found() {
                    return Err(ReleaseError::ObjectStore {
                        bucket: bucket.to_string(),
                        cause: service_err.to_string(),
                    }
                    .into());
                }

                info!("bucket \"{bucket}\" does not exist, creating...");
                let mut request = self.client.create_bucket().bucket(bucket);
                // us-east-1 is the one region that must not be named in a
                // location constraint.
                if region != "us-east-1" {
                    request = request.create_bucket_configuration(
                        CreateBucketConfiguration::builder()
                            .location_constraint(BucketLocationConstraint::from(region))
                            .build(),
                    );
                }
                request.send().await.map_err(|e| ReleaseError::ObjectStore {
                    bucket: bucket.to_string(),
                    cause: e.into_service_error().to_string(),
                })?;
                Ok(())
            }
        }
    }
}
