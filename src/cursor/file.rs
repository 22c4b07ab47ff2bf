//! Plain-file cursor store
//!
//! Layout: the global cursor lives at the configured state path itself; a
//! stream cursor lives next to it at `"{path}_{stream}"`, with `/` in the
//! stream name replaced by `-`. Each file holds the raw token.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::trace;

use super::{chomp, CursorKey, CursorStore};
use crate::error::{CwTailError, Result};

/// Stores each cursor in its own file.
#[derive(Debug, Clone)]
pub struct FileCursorStore {
    base: PathBuf,
}

impl FileCursorStore {
    /// Create a store rooted at `base`, creating its parent directory.
    ///
    /// # Arguments
    ///
    /// * `base` - State file path; stream cursors are derived from it
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Storage` if the parent directory cannot be created.
    ///
    /// # Examples
    ///
    /// ```
    /// use cwlogs_tail::cursor::{CursorKey, FileCursorStore};
    ///
    /// let store = FileCursorStore::new("/tmp/cwlogs-tail-doc/state").unwrap();
    /// assert_eq!(
    ///     store.path_for(&CursorKey::Stream("2024/05/01/app".to_string())),
    ///     std::path::PathBuf::from("/tmp/cwlogs-tail-doc/state_2024-05-01-app")
    /// );
    /// ```
    pub fn new(base: impl Into<PathBuf>) -> Result<Self> {
        let base = base.into();

        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context("Failed to create state directory")
                .map_err(|e| CwTailError::Storage(format!("{:#}", e)))?;
        }

        Ok(Self { base })
    }

    /// File that holds the cursor for `key`.
    pub fn path_for(&self, key: &CursorKey) -> PathBuf {
        match key {
            CursorKey::Global => self.base.clone(),
            CursorKey::Stream(name) => {
                let mut path = OsString::from(self.base.as_os_str());
                path.push("_");
                path.push(name.replace('/', "-"));
                PathBuf::from(path)
            }
        }
    }

    fn write_atomically(path: &Path, token: &str) -> std::io::Result<()> {
        let mut tmp = OsString::from(path.as_os_str());
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = File::create(&tmp)?;
        file.write_all(token.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    }
}

impl CursorStore for FileCursorStore {
    fn get(&self, key: &CursorKey) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(chomp(&contents).to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CwTailError::Storage(format!(
                "Failed to read cursor {}: {}",
                path.display(),
                e
            ))
            .into()),
        }
    }

    fn put(&self, key: &CursorKey, token: &str) -> Result<()> {
        let path = self.path_for(key);
        Self::write_atomically(&path, token).map_err(|e| {
            CwTailError::Storage(format!("Failed to write cursor {}: {}", path.display(), e))
        })?;
        trace!(cursor = %key, path = %path.display(), "Cursor persisted");
        Ok(())
    }
}
