//! On-disk slot holding the current session token.
//!
//! One slot per working directory: writing overwrites whatever session was
//! there, clearing removes the file.

use anyhow::{Context, Result};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `token` to the slot, replacing any previous session
    pub fn persist(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Failed to open session file {}", self.path.display()))?;
        // `mode` only applies on create; an older file may be wider
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict session file {}", self.path.display()))?;
        }
        file.write_all(token.as_bytes())
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;

        debug!("Session written to {}", self.path.display());
        Ok(())
    }

    /// Read the slot. Missing or blank files mean no session.
    pub fn current(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                Ok((!token.is_empty()).then(|| token.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read session file {}", self.path.display())),
        }
    }

    /// Remove the slot. Returns `false` when there was nothing to clear.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Session file {} removed", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove session file {}", self.path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_slot() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join(".token"));
        assert_eq!(store.current().unwrap(), None);
    }

    #[test]
    fn test_persist_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join(".token"));

        store.persist("first-token").unwrap();
        store.persist("second").unwrap();
        assert_eq!(store.current().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join(".token"));

        store.persist("token").unwrap();
        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert_eq!(store.current().unwrap(), None);
    }

    #[test]
    fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("state/session/.token"));
        store.persist("token").unwrap();
        assert_eq!(store.current().unwrap().as_deref(), Some("token"));
    }

    #[test]
    fn test_blank_file_is_no_session() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".token");
        std::fs::write(&path, "\n  \n").unwrap();
        assert_eq!(SessionStore::new(path).current().unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join(".token"));
        store.persist("token").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_session_file_is_narrowed() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".token");
        std::fs::write(&path, "old-token").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let store = SessionStore::new(&path);
        store.persist("new-token").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(store.current().unwrap().as_deref(), Some("new-token"));
    }
}
