use std::{
    collections::BTreeSet,
    io,
    path::{Path, PathBuf},
};

use async_walkdir::WalkDir;
use log::{debug, info, warn};
use regex::RegexSet;
use tokio::fs;
use tokio_stream::StreamExt;

use crate::{
    error::{Error, Result},
    format::{format_path, format_size},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
}

/// Lists every regular file below `dir`, largest first. A file is dropped
/// when its full path matches any of `exclude_patterns`.
pub async fn list_files<S: AsRef<str>>(dir: &Path, exclude_patterns: &[S]) -> Result<Vec<FileEntry>> {
    info!("listing files to upload in {}", format_path(dir));
    let exclude = exclude_set(exclude_patterns)?;
    check_dir(dir).await?;

    let mut files = vec![];
    let mut walker = WalkDir::new(dir);
    while let Some(entry) = walker.try_next().await? {
        let path = entry.path();
        let metadata = match fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("skipped dangling link {}", format_path(&path));
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        if !metadata.is_file() {
            continue;
        }

        if let Some(exclude) = &exclude {
            if exclude.is_match(&path.to_string_lossy()) {
                debug!("excluded {}", format_path(&path));
                continue;
            }
        }

        files.push(FileEntry {
            path,
            size: metadata.len(),
        });
    }

    files.sort_by(|a, b| b.size.cmp(&a.size));

    let total_size = files.iter().map(|file| file.size).sum::<u64>();
    info!(
        "{} files found to upload totalling {}",
        files.len(),
        format_size(total_size)
    );
    Ok(files)
}

/// Drops files that are already uploaded, keeping the size order intact.
pub fn filter_uploaded(files: Vec<FileEntry>, uploaded: &BTreeSet<PathBuf>) -> Vec<FileEntry> {
    let total = files.len();
    let remaining = files
        .into_iter()
        .filter(|file| !uploaded.contains(&file.path))
        .collect::<Vec<_>>();

    debug!(
        "total local files: {total} | already uploaded: {} | left to upload: {}",
        uploaded.len(),
        remaining.len()
    );
    remaining
}

fn exclude_set<S: AsRef<str>>(patterns: &[S]) -> Result<Option<RegexSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let set = RegexSet::new(patterns.iter().map(AsRef::as_ref))?;
    Ok(Some(set))
}

async fn check_dir(dir: &Path) -> Result<()> {
    match fs::metadata(dir).await {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Error::FileIsNotDirectory(dir.to_owned())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            Err(Error::FileDoesNotExist(dir.to_owned()))
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeSet, fs, path::Path};

    use tempfile::TempDir;

    use super::{filter_uploaded, list_files};

    const NO_PATTERNS: &[&str] = &[];

    fn write_file(root: &Path, relative: &str, size: usize) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, vec![b'x'; size]).unwrap();
    }

    fn names(root: &Path, files: &[super::FileEntry]) -> Vec<String> {
        files
            .iter()
            .map(|file| {
                file.path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    #[tokio::test]
    async fn list_sorted_by_size_descending() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "small.txt", 10);
        write_file(dir.path(), "a/b/large.bin", 300);
        write_file(dir.path(), "a/medium.bin", 100);

        let files = list_files(dir.path(), NO_PATTERNS).await.unwrap();
        assert_eq!(
            names(dir.path(), &files),
            vec!["a/b/large.bin", "a/medium.bin", "small.txt"]
        );
        assert_eq!(files[0].size, 300);
        assert!(files.iter().all(|file| file.path.is_absolute()));
    }

    #[tokio::test]
    async fn list_skips_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("empty/nested")).unwrap();
        write_file(dir.path(), "one.txt", 1);

        let files = list_files(dir.path(), NO_PATTERNS).await.unwrap();
        assert_eq!(names(dir.path(), &files), vec!["one.txt"]);
    }

    #[tokio::test]
    async fn list_excludes_any_matching_pattern() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "Data/keep.bcl", 5);
        write_file(dir.path(), "Logs/run.log", 4);
        write_file(dir.path(), "Thumbnail_Images/t.jpg", 3);

        let patterns = ["Logs/", r"\.jpg$"];
        let files = list_files(dir.path(), &patterns).await.unwrap();
        assert_eq!(names(dir.path(), &files), vec!["Data/keep.bcl"]);
    }

    #[tokio::test]
    async fn list_invalid_pattern_error() {
        let dir = TempDir::new().unwrap();
        assert!(list_files(dir.path(), &["("]).await.is_err());
    }

    #[tokio::test]
    async fn list_missing_dir_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        assert!(list_files(&missing, NO_PATTERNS).await.is_err());
    }

    #[tokio::test]
    async fn filter_keeps_order() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a", 3);
        write_file(dir.path(), "b", 2);
        write_file(dir.path(), "c", 1);

        let files = list_files(dir.path(), NO_PATTERNS).await.unwrap();
        let uploaded = BTreeSet::from([dir.path().join("b")]);
        let remaining = filter_uploaded(files, &uploaded);
        assert_eq!(names(dir.path(), &remaining), vec!["a", "c"]);
    }
}
