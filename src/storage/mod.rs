mod local;
mod s3;

use std::{fmt::Debug, path::Path, sync::Arc};

use async_trait::async_trait;
use log::{debug, info};

use crate::error::{Error, Result};

pub use self::{local::LocalStorage, s3::S3Connector};

pub type SharedStorage = Arc<dyn Storage + Send + Sync + 'static>;

/// The two blob-store capabilities the uploader needs, plus a bucket
/// existence check used once at start-up.
#[async_trait]
pub trait Storage: Debug {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()>;

    /// Returns the identifier of a stored object (an ETag for S3).
    async fn head(&self, bucket: &str, key: &str) -> Result<String>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;
}

/// Hands out client instances. Each upload worker connects once and shares
/// its client between its own transfer tasks only.
pub trait Connector: Debug + Send + Sync {
    fn connect(&self) -> Result<SharedStorage>;
}

pub type SharedConnector = Arc<dyn Connector + 'static>;

pub async fn check_buckets<I, S>(storage: &SharedStorage, buckets: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut invalid = vec![];

    for bucket in buckets {
        let bucket = bucket.as_ref();
        debug!("checking bucket `{bucket}` exists and is accessible");
        if !storage.bucket_exists(bucket).await? {
            invalid.push(bucket.to_owned());
        }
    }

    if invalid.is_empty() {
        info!("all buckets exist and are accessible");
        Ok(())
    } else {
        Err(Error::InaccessibleBuckets(invalid))
    }
}
