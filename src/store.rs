//! Profile storage
//!
//! A profile is one `<name>.json` file in the profile directory
//! (`~/.config/gdp` unless overridden). The store only moves bytes around;
//! serialization happens in the commands.

use std::fs;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::profile;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid profile name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("profile '{0}' not found")]
    NotFound(String),

    #[error("profile '{0}' already exists")]
    AlreadyExists(String),

    #[error("failed to {action} {}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        StoreError::Io { action, path: path.to_path_buf(), source }
    }
}

/// Byte level persistence keyed by profile name
pub trait ProfileStore {
    fn store(&self, name: &str, data: &[u8]) -> Result<(), StoreError>;
    fn load(&self, name: &str) -> Result<Vec<u8>, StoreError>;
    /// Profile names, sorted
    fn list(&self) -> Result<Vec<String>, StoreError>;
    fn delete(&self, name: &str) -> Result<(), StoreError>;
    fn exists(&self, name: &str) -> Result<bool, StoreError>;
}

/// Reject names that would not map back to themselves or escape the directory
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name == "." || name == ".." {
        "name is a directory reference"
    } else if name.contains('/') || name.contains('\0') {
        "name contains a path separator or NUL"
    } else if name.ends_with(&format!(".{}", profile::EXTENSION)) {
        "name already ends in .json"
    } else {
        return Ok(());
    };
    Err(StoreError::InvalidName { name: name.to_string(), reason })
}

/// Profiles stored as JSON files in a local directory
#[derive(Debug)]
pub struct LocalProfileStore {
    dir: PathBuf,
}

impl LocalProfileStore {
    /// `~/.config/gdp`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(profile::APP_DIR))
    }

    /// Open the store, creating the directory on first use
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        if !dir.is_dir() {
            fs::DirBuilder::new()
                .recursive(true)
                .mode(profile::DIR_MODE)
                .create(&dir)
                .map_err(|e| StoreError::io("create profile directory", &dir, e))?;
            info!(path = %dir.display(), "created profile directory");
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.{}", profile::EXTENSION)))
    }
}

impl ProfileStore for LocalProfileStore {
    fn store(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.path(name)?;
        fs::write(&path, data).map_err(|e| StoreError::io("write", &path, e))?;
        debug!(profile = %name, path = %path.display(), bytes = data.len(), "stored profile");
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path(name)?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => StoreError::io("read", &path, e),
        })
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io("read directory", &self.dir, e))?;

        let suffix = format!(".{}", profile::EXTENSION);
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io("read directory", &self.dir, e))?;
            if !entry.path().is_file() {
                continue;
            }
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if let Some(name) = file_name.strip_suffix(&suffix) {
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path(name)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => StoreError::io("remove", &path, e),
        })?;
        debug!(profile = %name, "deleted profile");
        Ok(())
    }

    fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.path(name)?.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn temp_store() -> (tempfile::TempDir, LocalProfileStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalProfileStore::open(tmp.path().join("gdp")).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_open_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("gdp");
        let store = LocalProfileStore::open(&dir).unwrap();

        assert!(store.dir().is_dir());
        let mode = fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o022, 0, "directory must not be group/other writable");
    }

    #[test]
    fn test_save_list_delete() {
        let (_tmp, store) = temp_store();

        store.store("work", b"{}").unwrap();
        assert!(store.list().unwrap().contains(&"work".to_string()));
        assert_eq!(store.load("work").unwrap(), b"{}");

        store.delete("work").unwrap();
        assert!(!store.list().unwrap().contains(&"work".to_string()));
        assert!(matches!(store.load("work"), Err(StoreError::NotFound(name)) if name == "work"));
    }

    #[test]
    fn test_file_layout() {
        let (_tmp, store) = temp_store();
        store.store("home office", b"data").unwrap();
        assert!(store.dir().join("home office.json").is_file());
        assert!(store.exists("home office").unwrap());
        assert!(!store.exists("elsewhere").unwrap());
    }

    #[test]
    fn test_list_skips_foreign_entries() {
        let (_tmp, store) = temp_store();
        store.store("b", b"1").unwrap();
        store.store("a", b"2").unwrap();
        fs::write(store.dir().join("notes.txt"), b"x").unwrap();
        fs::create_dir(store.dir().join("dir.json")).unwrap();

        assert_eq!(store.list().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_store_overwrites() {
        let (_tmp, store) = temp_store();
        store.store("p", b"old").unwrap();
        store.store("p", b"new").unwrap();
        assert_eq!(store.load("p").unwrap(), b"new");
    }

    #[test]
    fn test_delete_missing_profile() {
        let (_tmp, store) = temp_store();
        assert!(matches!(store.delete("ghost"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_invalid_names() {
        let (_tmp, store) = temp_store();
        for name in ["", ".", "..", "a/b", "work.json"] {
            assert!(
                matches!(store.store(name, b"x"), Err(StoreError::InvalidName { .. })),
                "{name:?} should be rejected"
            );
        }
        assert!(validate_name("work.json.bak").is_ok());
    }
}
