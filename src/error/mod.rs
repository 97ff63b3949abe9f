mod from;

use std::{fmt::Display, path::PathBuf};

use itertools::Itertools;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no item found for key `{0}`")]
    ItemNotFound(String),

    #[error("`{0}` does not exist")]
    FileDoesNotExist(PathBuf),

    #[error("`{0}` is not a directory")]
    FileIsNotDirectory(PathBuf),

    #[error("`{0}` does not appear to be a completed run")]
    NotCompletedRun(PathBuf),

    #[error("`{path}` is not under `{parent}`")]
    PathOutsideParent { path: PathBuf, parent: PathBuf },

    #[error("pattern `{0}` is invalid")]
    InvalidPattern(String),

    #[error("{} error(s) found in config:\n\t{}", .0.len(), .0.iter().join("\n\t"))]
    InvalidConfig(Vec<String>),

    #[error("{0}")]
    Credentials(String),

    #[error("{} bucket(s) not accessible or do not exist: {}", .0.len(), .0.iter().join(", "))]
    InaccessibleBuckets(Vec<String>),

    #[error("upload state `{path}` is malformed ({reason})")]
    MalformedState { path: PathBuf, reason: String },

    #[error("no object id returned for key `{0}`")]
    MissingObjectId(String),

    #[error("no upload id returned for key `{0}`")]
    MissingUploadId(String),

    #[error("lock `{0}` is held by another process")]
    LockHeld(PathBuf),

    #[error("upload worker failed: {0}")]
    WorkerFailed(String),

    #[error(transparent)]
    Other(AnyError),
}

#[derive(Error, Debug)]
pub struct AnyError(anyhow::Error);

impl Display for AnyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error {
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Other(AnyError(error.into()))
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::Other(AnyError(error))
    }
}
