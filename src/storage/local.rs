use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::{fs, task::spawn_blocking};

use crate::{
    error::{Error, Result},
    format::format_object,
};

use super::{Connector, SharedStorage, Storage};

/// Stores objects as plain files under `<root>/<bucket>/<key>`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        LocalStorage { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.bucket_path(bucket).join(key)
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put_file(&self, bucket: &str, key: &str, path: &Path) -> Result<()> {
        let bucket_path = self.bucket_path(bucket);
        if !fs::try_exists(&bucket_path).await? {
            return Err(Error::ItemNotFound(bucket.to_owned()));
        }

        let object_path = self.object_path(bucket, key);
        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        fs::copy(path, &object_path).await?;
        Ok(())
    }

    async fn head(&self, bucket: &str, key: &str) -> Result<String> {
        let object_path = self.object_path(bucket, key);
        let bytes = match fs::read(&object_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ItemNotFound(format_object(bucket, key)));
            }
            Err(err) => return Err(err.into()),
        };

        let digest = spawn_blocking(move || md5::compute(bytes)).await?;
        Ok(format!("{digest:x}"))
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let exists = fs::try_exists(self.bucket_path(bucket)).await?;
        Ok(exists)
    }
}

impl Connector for LocalStorage {
    fn connect(&self) -> Result<SharedStorage> {
        Ok(Arc::new(self.clone()))
    }
}
