use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_s3::{
    config::{retry::RetryConfig, Builder as S3ConfigBuilder, Credentials as S3Credentials},
    error::SdkError,
    operation::head_object::HeadObjectError,
    primitives::{ByteStream, Length},
    types::{CompletedMultipartUpload, CompletedPart},
    Client,
};
use log::{debug, warn};
use tokio::fs;

use crate::{
    config::Credentials,
    error::{Error, Result},
    format::{format_object, format_size},
};

use super::{Connector, SharedStorage, Storage};

const MAX_ATTEMPTS: u32 = 10;
const CREDENTIALS_PROVIDER_NAME: &str = "runlift";

/// Files of at least this size go up in parts.
pub const MULTIPART_THRESHOLD: u64 = 1024 * 1024 * 1024;
const MIN_PART_SIZE: u64 = 64 * 1024 * 1024;
const MAX_PARTS: u64 = 10_000;

/// One byte range of a file, numbered from 1 as S3 expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub number: i32,
    pub offset: u64,
    pub length: u64,
}

/// Part size for a file of `size` bytes, grown past the minimum only when
/// the part count limit would otherwise be exceeded.
pub fn part_size(size: u64) -> u64 {
    MIN_PART_SIZE.max(size.div_ceil(MAX_PARTS))
}

pub fn part_ranges(size: u64, part_size: u64) -> Vec<PartRange> {
    let part_size = part_size.max(1);
    let mut parts = vec![];
    let mut offset = 0;
    let mut number = 1;

    while offset < size {
        let length = part_size.min(size - offset);
        parts.push(PartRange {
            number,
            offset,
            length,
        });
        offset += length;
        number += 1;
    }

    parts
}

#[derive(Debug)]
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub fn new(client: Client) -> Self {
        S3Storage { client }
    }

    /// Uploads `path` in parts. A failed upload is aborted so S3 does not
    /// keep the parts already sent.
    async fn put_multipart(&self, bucket: &str, key: &str, path: &Path, size: u64) -> Result<()> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;
        let upload_id = response
            .upload_id()
            .ok_or_else(|| Error::MissingUploadId(format_object(bucket, key)))?
            .to_owned();

        let part_size = part_size(size);
        debug!(
            "uploading {} to {} in parts of {}",
            format_size(size),
            format_object(bucket, key),
            format_size(part_size)
        );

        let result = self
            .send_parts(bucket, key, path, &upload_id, part_ranges(size, part_size))
            .await;

        if result.is_err() {
            let aborted = self
                .client
                .abort_multipart_upload()
                .bucket(bucket)
                .key(key)
                .upload_id(&upload_id)
                .send()
                .await;
            if let Err(err) = aborted {
                warn!(
                    "could not abort upload {upload_id} of {}: {err}",
                    format_object(bucket, key)
                );
            }
        }

        result
    }

    async fn send_parts(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        upload_id: &str,
        ranges: Vec<PartRange>,
    ) -> Result<()> {
        let mut parts = Vec::with_capacity(ranges.len());

        for range in ranges {
            let body = ByteStream::read_from()
                .path(path)
                .offset(range.offset)
                .length(Length::Exact(range.length))
                .build()
                .await?;

            let response = self
                .client
                .upload_part()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(range.number)
                .body(body)
                .send()
                .await?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(response.e_tag)
                    .part_number(range.number)
                    .build(),
            );
        }

        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(parts))
            .build();
        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let size = fs::metadata(path).await?.len();
        if size >= MULTIPART_THRESHOLD {
            return self.put_multipart(bucket, key, path, size).await;
        }

        let body = ByteStream::from_path(path).await?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await?;
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<String> {
        let response = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(SdkError::into_service_error)
            .map_err(|err| match err {
                HeadObjectError::NotFound(_) => Error::ItemNotFound(format_object(bucket, key)),
                err => Error::other(err),
            })?;

        let etag = response
            .e_tag()
            .map(|etag| etag.trim_matches('"').to_owned())
            .ok_or_else(|| Error::MissingObjectId(format_object(bucket, key)))?;
        Ok(etag)
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let result = self.client.head_bucket().bucket(bucket).send().await;
        if let Err(err) = &result {
            debug!("bucket `{bucket}` is not accessible ({err})");
        }

        Ok(result.is_ok())
    }
}

/// Builds S3 clients from one shared SDK config resolved at start-up.
#[derive(Debug, Clone)]
pub struct S3Connector {
    sdk_config: SdkConfig,
}

impl S3Connector {
    pub async fn new(credentials: &Credentials) -> Self {
        let loader = aws_config::from_env();
        let loader = match credentials {
            Credentials::Profile(profile) => loader.profile_name(profile),
            Credentials::Keys {
                access_key,
                secret_key,
            } => loader.credentials_provider(S3Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                CREDENTIALS_PROVIDER_NAME,
            )),
        };

        let sdk_config = loader.load().await;
        S3Connector { sdk_config }
    }
}

impl Connector for S3Connector {
    fn connect(&self) -> Result<SharedStorage> {
        let s3_config = S3ConfigBuilder::from(&self.sdk_config)
            .retry_config(RetryConfig::standard().with_max_attempts(MAX_ATTEMPTS))
            .build();
        let client = Client::from_conf(s3_config);
        Ok(Arc::new(S3Storage::new(client)))
    }
}

#[cfg(test)]
mod tests {
    use super::{part_ranges, part_size, PartRange, MIN_PART_SIZE, MULTIPART_THRESHOLD};

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn ranges_cover_file() {
        let size = 6 * GIB + 123;
        let ranges = part_ranges(size, part_size(size));

        assert_eq!(ranges.len(), 97);
        assert_eq!(ranges.first().map(|range| range.number), Some(1));
        assert_eq!(ranges.last().map(|range| range.number), Some(97));
        assert_eq!(ranges.last().map(|range| range.length), Some(123));

        let mut offset = 0;
        for range in &ranges {
            assert_eq!(range.offset, offset);
            offset += range.length;
        }
        assert_eq!(offset, size);
    }

    #[test]
    fn ranges_exact_multiple() {
        assert_eq!(
            part_ranges(20, 10),
            vec![
                PartRange { number: 1, offset: 0, length: 10 },
                PartRange { number: 2, offset: 10, length: 10 },
            ]
        );
    }

    #[test]
    fn ranges_empty_file() {
        assert!(part_ranges(0, 10).is_empty());
    }

    #[test]
    fn part_size_respects_part_limit() {
        assert_eq!(part_size(MULTIPART_THRESHOLD), MIN_PART_SIZE);

        let huge = 5 * 1024 * GIB;
        let size = part_size(huge);
        assert!(size > MIN_PART_SIZE);
        assert!(part_ranges(huge, size).len() <= 10_000);
    }
}
