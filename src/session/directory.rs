//! On-disk session directories.
//!
//! Every (project, key) pair owns `{root}/{project}/{key}/`, which holds the
//! session's shell history file. Directories are created on first use and
//! never removed.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::name::sanitize_key;
use crate::error::KeyshellError;
use crate::Result;

/// Path of the session directory for (project, key), without touching disk.
///
/// Both components are sanitized so neither can add directory levels.
pub fn session_dir_path(root: &Path, project: &str, key: &str) -> PathBuf {
    root.join(sanitize_key(project)).join(sanitize_key(key))
}

/// Create the session directory for (project, key) if needed.
///
/// Idempotent. Returns the canonical absolute path.
pub fn ensure_directory(root: &Path, project: &str, key: &str) -> Result<PathBuf> {
    let path = session_dir_path(root, project, key);

    std::fs::create_dir_all(&path).map_err(|source| KeyshellError::DirectoryCreation {
        path: path.clone(),
        source,
    })?;

    let resolved = path
        .canonicalize()
        .map_err(|source| KeyshellError::DirectoryCreation { path, source })?;

    debug!(dir = %resolved.display(), "session directory ready");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_nested_directory() {
        let root = TempDir::new().unwrap();
        let dir = ensure_directory(root.path(), "kernel", "1").unwrap();

        assert!(dir.is_dir());
        assert!(dir.is_absolute());
        assert!(dir.ends_with("kernel/1"));
    }

    #[test]
    fn test_idempotent() {
        let root = TempDir::new().unwrap();
        let first = ensure_directory(root.path(), "kernel", "1").unwrap();
        let second = ensure_directory(root.path(), "kernel", "1").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_separator_in_key_stays_one_level() {
        let root = TempDir::new().unwrap();
        let dir = ensure_directory(root.path(), "kernel", "a/b").unwrap();

        let project_dir = root.path().join("kernel").canonicalize().unwrap();
        assert_eq!(dir.parent().unwrap(), project_dir);
        assert_eq!(dir.file_name().unwrap(), "a%2Fb");
    }

    #[test]
    fn test_distinct_projects_distinct_dirs() {
        let root = TempDir::new().unwrap();
        let a = ensure_directory(root.path(), "A", "1").unwrap();
        let b = ensure_directory(root.path(), "B", "1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_file_in_the_way_fails() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("kernel")).unwrap();
        std::fs::write(root.path().join("kernel").join("1"), b"not a dir").unwrap();

        let err = ensure_directory(root.path(), "kernel", "1").unwrap_err();
        assert!(matches!(err, KeyshellError::DirectoryCreation { .. }));
    }

    #[test]
    fn test_dir_path_is_pure() {
        let path = session_dir_path(Path::new("/sessions"), "-", "3");
        assert_eq!(path, PathBuf::from("/sessions/-/3"));
    }
}
