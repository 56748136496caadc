//! S3-compatible blob store (AWS S3, MinIO, R2, ...)

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::create_bucket::CreateBucketError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::primitives::ByteStream as S3Body;
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::StreamExt;
use tokio_util::io::ReaderStream;

use super::{BlobError, BlobResult, BlobStore, ByteRange, ByteStream, ObjectStat, PutResult};
use crate::config::StorageConfig;
use crate::constants::STREAM_CHUNK_BYTES;

/// Blob store backed by an S3-compatible service
#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
}

impl S3BlobStore {
    /// Build a client from storage configuration
    ///
    /// Static credentials are used when both keys are configured, otherwise the
    /// default AWS provider chain applies.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "static",
            ));
        }

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }

        let sdk_config = loader.load().await;
        let client = Client::from_conf(
            aws_sdk_s3::config::Builder::from(&sdk_config)
                // MinIO and most self-hosted stores only speak path-style
                .force_path_style(config.endpoint.is_some())
                .build(),
        );

        tracing::info!(
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "S3 blob store client created"
        );

        Self { client }
    }
}

fn unavailable(err: impl std::fmt::Display) -> BlobError {
    BlobError::Unavailable(err.to_string())
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn ensure_bucket(&self, bucket: &str) -> BlobResult<()> {
        if self.client.head_bucket().bucket(bucket).send().await.is_ok() {
            return Ok(());
        }

        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => {
                tracing::info!(bucket = %bucket, "Created bucket");
                Ok(())
            }
            // Another writer created it between our head and create
            Err(SdkError::ServiceError(service_err))
                if matches!(
                    service_err.err(),
                    CreateBucketError::BucketAlreadyOwnedByYou(_)
                        | CreateBucketError::BucketAlreadyExists(_)
                ) =>
            {
                Ok(())
            }
            Err(e) => {
                tracing::error!(bucket = %bucket, error = %e, "Failed to create bucket");
                Err(unavailable(e))
            }
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> BlobResult<PutResult> {
        let size = data.len() as u64;
        let start = std::time::Instant::now();

        let mut request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(S3Body::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }

        let output = request.send().await.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                "S3 upload failed"
            );
            unavailable(e)
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(PutResult {
            etag: output.e_tag().map(str::to_string),
            size,
        })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> BlobResult<ObjectStat> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(service_err)
                    if matches!(service_err.err(), HeadObjectError::NotFound(_)) =>
                {
                    BlobError::not_found(bucket, key)
                }
                _ => unavailable(&e),
            })?;

        Ok(ObjectStat {
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            etag: output.e_tag().map(str::to_string),
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> BlobResult<ByteStream> {
        let mut request = self.client.get_object().bucket(bucket).key(key);
        if let Some(range) = range {
            request = request.range(range.to_header_value());
        }

        let output = request.send().await.map_err(|e| match &e {
            SdkError::ServiceError(service_err) => match service_err.err() {
                GetObjectError::NoSuchKey(_) => BlobError::not_found(bucket, key),
                GetObjectError::InvalidObjectState(_) => BlobError::Invalid(e.to_string()),
                _ => unavailable(&e),
            },
            _ => unavailable(&e),
        })?;

        // The response body is read lazily: only as fast as the consumer polls
        let reader = output.body.into_async_read();
        let stream = ReaderStream::with_capacity(reader, STREAM_CHUNK_BYTES);

        let bucket = bucket.to_string();
        let key = key.to_string();
        let logged = stream.map(move |chunk| {
            if let Err(e) = &chunk {
                tracing::error!(bucket = %bucket, key = %key, error = %e, "S3 stream read error");
            }
            chunk
        });

        Ok(Box::pin(logged))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket = %bucket, key = %key, error = %e, "S3 delete failed");
                unavailable(e)
            })?;

        tracing::info!(bucket = %bucket, key = %key, "S3 object deleted");
        Ok(())
    }
}
