use crate::config::Config;
use crate::domain::{Listing, NewObject, ObjectInfo, ObjectStore, StoreError};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// [`ObjectStore`] backed by an S3-compatible service.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Builds a client bound to the configured endpoint with static
    /// credentials. Path-style addressing is forced because the backing
    /// store does not support virtual-hosted bucket subdomains.
    pub async fn new(config: &Config) -> Self {
        let credentials = Credentials::new(
            config.key_id.clone(),
            config.secret_key.clone(),
            None,
            None,
            "pail",
        );
        let base = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = S3ConfigBuilder::from(&base)
            .endpoint_url(config.endpoint.clone())
            .force_path_style(true)
            .build();

        tracing::info!(
            "object store client bound to {} bucket {}",
            config.endpoint,
            config.bucket
        );

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
        }
    }

    fn presign_config(expires_in: Duration) -> Result<PresigningConfig, StoreError> {
        PresigningConfig::expires_in(expires_in).map_err(|e| StoreError::Presign(e.to_string()))
    }
}

fn backend_error(e: impl std::error::Error) -> StoreError {
    StoreError::Backend(DisplayErrorContext(e).to_string())
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(&self, object: NewObject) -> Result<(), StoreError> {
        let NewObject {
            key,
            content_type,
            original_name,
            uploaded_at,
            body,
        } = object;

        self.client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .metadata("originalname", original_name)
            .metadata("uploaddate", uploaded_at.to_rfc3339())
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn list(&self, prefix: &str, max_keys: i32) -> Result<Listing, StoreError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(self.bucket.as_str())
            .prefix(prefix)
            .max_keys(max_keys)
            .send()
            .await
            .map_err(backend_error)?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?.to_string();
                let size = u64::try_from(object.size().unwrap_or_default()).unwrap_or_default();
                let last_modified = object
                    .last_modified()
                    .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_else(Utc::now);
                Some(ObjectInfo {
                    key,
                    size,
                    last_modified,
                })
            })
            .collect();

        Ok(Listing {
            objects,
            is_truncated: response.is_truncated().unwrap_or(false),
        })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .send()
            .await
            .map_err(backend_error)?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StoreError> {
        let request = self
            .client
            .get_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .presigned(Self::presign_config(expires_in)?)
            .await
            .map_err(backend_error)?;
        Ok(request.uri().to_string())
    }

    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, StoreError> {
        let request = self
            .client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(key)
            .content_type(content_type)
            .presigned(Self::presign_config(expires_in)?)
            .await
            .map_err(backend_error)?;
        Ok(request.uri().to_string())
    }
}
