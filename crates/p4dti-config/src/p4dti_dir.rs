//! Discovery and management of the `.p4dti/` directory.
//!
//! The `.p4dti/` directory holds a replicator instance's configuration
//! and local state. This module finds it by walking up the directory
//! tree, and creates it when bootstrapping a new instance (`p4dti init`).

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;

/// The name of the replicator metadata directory.
const P4DTI_DIR_NAME: &str = ".p4dti";

/// Environment variable naming a configuration file path, consulted only
/// if the configuration was not already resolved from an explicit
/// `--config` flag.
pub const P4DTI_CONFIG_ENV: &str = "P4DTI_CONFIG";

/// Walks up the directory tree from `start` looking for a `.p4dti/`
/// directory. Returns `None` if the filesystem root is reached without
/// finding one.
pub fn find_p4dti_dir(start: &Path) -> Option<PathBuf> {
    let start = start.canonicalize().ok()?;

    let mut current = start.as_path();
    loop {
        let candidate = current.join(P4DTI_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => return None,
        }
    }
}

/// Creates a `.p4dti/` directory at `root` if it does not already exist.
pub fn init_p4dti_dir(root: &Path) -> Result<PathBuf, ConfigError> {
    let dir = root.join(P4DTI_DIR_NAME);
    fs::create_dir_all(&dir).map_err(ConfigError::ReadError)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finds_dir_in_ancestor() {
        let root = tempdir().unwrap();
        let nested = root.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();
        init_p4dti_dir(root.path()).unwrap();

        let found = find_p4dti_dir(&nested).unwrap();
        assert_eq!(found, root.path().canonicalize().unwrap().join(".p4dti"));
    }

    #[test]
    fn returns_none_when_absent() {
        let root = tempdir().unwrap();
        let nested = root.path().join("x/y");
        fs::create_dir_all(&nested).unwrap();
        assert!(find_p4dti_dir(&nested).is_none());
    }
}
