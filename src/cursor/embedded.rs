//! Cursor store backed by an embedded `sled` database
//!
//! All cursors of an instance live in one database directory. Keys are
//! `global` or `stream/{name}`; values are the raw token bytes. Every `put`
//! is flushed before returning.

use std::path::Path;

use sled::Db;

use super::{chomp, CursorKey, CursorStore};
use crate::error::{CwTailError, Result};

/// Cursor store in a `sled` key-value database.
#[derive(Debug, Clone)]
pub struct EmbeddedCursorStore {
    db: Db,
}

impl EmbeddedCursorStore {
    /// Open or create the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Storage` if the database cannot be opened
    /// (for example when another process holds its lock).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref()).map_err(|e| {
            CwTailError::Storage(format!(
                "Failed to open cursor database {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Self { db })
    }

    fn db_key(key: &CursorKey) -> Vec<u8> {
        match key {
            CursorKey::Global => b"global".to_vec(),
            CursorKey::Stream(name) => format!("stream/{}", name).into_bytes(),
        }
    }
}

impl CursorStore for EmbeddedCursorStore {
    fn get(&self, key: &CursorKey) -> Result<Option<String>> {
        let value = self
            .db
            .get(Self::db_key(key))
            .map_err(|e| CwTailError::Storage(format!("Failed to read cursor {}: {}", key, e)))?;

        match value {
            Some(bytes) => {
                let token = String::from_utf8(bytes.to_vec()).map_err(|e| {
                    CwTailError::Storage(format!("Cursor {} is not valid UTF-8: {}", key, e))
                })?;
                Ok(Some(chomp(&token).to_string()))
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &CursorKey, token: &str) -> Result<()> {
        self.db
            .insert(Self::db_key(key), token.as_bytes())
            .map_err(|e| CwTailError::Storage(format!("Failed to write cursor {}: {}", key, e)))?;
        self.db
            .flush()
            .map_err(|e| CwTailError::Storage(format!("Failed to flush cursor {}: {}", key, e)))?;
        Ok(())
    }
}
