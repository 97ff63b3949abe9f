use std::path::{Component, Path, PathBuf};

use itertools::Itertools;

use crate::error::{Error, Result};

pub const KEY_SEPARATOR: &str = "/";

/// Builds the object key for `local_path` by dropping `parent_path` and
/// joining what remains onto `remote_prefix`. Path segments are used as-is.
pub fn remote_key(local_path: &Path, parent_path: &Path, remote_prefix: &str) -> Result<String> {
    let relative_path =
        local_path
            .strip_prefix(parent_path)
            .map_err(|_| Error::PathOutsideParent {
                path: local_path.to_owned(),
                parent: parent_path.to_owned(),
            })?;

    let relative_key = relative_path
        .components()
        .filter_map(|component| match component {
            Component::Normal(segment) => Some(segment.to_string_lossy()),
            _ => None,
        })
        .join(KEY_SEPARATOR);

    let prefix = remote_prefix.trim_matches('/');
    if prefix.is_empty() {
        Ok(relative_key)
    } else {
        Ok(format!("{prefix}{KEY_SEPARATOR}{relative_key}"))
    }
}

/// Remote keys keep the run directory name, so only the run's parent is
/// stripped.
pub fn parent_path(run_path: &Path) -> PathBuf {
    run_path.parent().unwrap_or(run_path).to_owned()
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{parent_path, remote_key};

    fn key(local: &str, parent: &str, prefix: &str) -> String {
        remote_key(Path::new(local), Path::new(parent), prefix).unwrap()
    }

    #[test]
    fn key_root_prefix() {
        assert_eq!(key("/seq/run1/a.txt", "/seq", "/"), "run1/a.txt");
        assert_eq!(key("/seq/run1/a.txt", "/seq", ""), "run1/a.txt");
    }

    #[test]
    fn key_nested_prefix() {
        assert_eq!(key("/seq/run1/x/y.bcl", "/seq", "/raw/2024"), "raw/2024/run1/x/y.bcl");
        assert_eq!(key("/seq/run1/x/y.bcl", "/seq/", "raw/"), "raw/run1/x/y.bcl");
    }

    #[test]
    fn key_outside_parent_error() {
        assert!(remote_key(Path::new("/other/run1/a"), Path::new("/seq"), "/").is_err());
    }

    #[test]
    fn key_keeps_run_dir_name() {
        let run = Path::new("/seq/240101_A01_0001");
        let parent = parent_path(run);
        assert_eq!(parent, PathBuf::from("/seq"));
        assert_eq!(
            remote_key(&run.join("Data/a.bcl"), &parent, "/raw").unwrap(),
            "raw/240101_A01_0001/Data/a.bcl"
        );
    }
}
