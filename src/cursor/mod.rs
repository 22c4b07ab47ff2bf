//! Persisted per-stream continuation tokens
//!
//! A cursor is the last forward token returned by the remote service for a
//! log stream. Absence of a cursor is the normal first-run condition and
//! means "read from the beginning of the configured time range".
//!
//! Backends:
//!
//! - [`FileCursorStore`] -- one plain-text file per stream (default).
//! - [`EmbeddedCursorStore`] -- a `sled` embedded database.
//! - [`MemoryCursorStore`] -- process memory only; used for dry runs and tests.
//!
//! Stores never decide *whether* to write; the event fetcher only calls
//! [`CursorStore::put`] after a successful fetch that produced a new token.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{StateBackend, StateConfig};
use crate::error::Result;

pub mod embedded;
pub mod file;

pub use embedded::EmbeddedCursorStore;
pub use file::FileCursorStore;

/// Identity a cursor is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CursorKey {
    /// Single cursor for the whole log group (no stream filtering)
    Global,
    /// Cursor of one named log stream
    Stream(String),
}

impl CursorKey {
    /// Key for an optional stream name; `None` maps to [`CursorKey::Global`].
    ///
    /// # Examples
    ///
    /// ```
    /// use cwlogs_tail::cursor::CursorKey;
    ///
    /// assert_eq!(CursorKey::for_stream(None), CursorKey::Global);
    /// assert_eq!(
    ///     CursorKey::for_stream(Some("2024/01/01/app")),
    ///     CursorKey::Stream("2024/01/01/app".to_string())
    /// );
    /// ```
    pub fn for_stream(stream: Option<&str>) -> Self {
        match stream {
            Some(name) => Self::Stream(name.to_string()),
            None => Self::Global,
        }
    }
}

impl fmt::Display for CursorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "<global>"),
            Self::Stream(name) => write!(f, "{}", name),
        }
    }
}

/// Durable storage for continuation tokens.
pub trait CursorStore: Send + Sync {
    /// Load the token stored for `key`, trimmed of a trailing newline.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    fn get(&self, key: &CursorKey) -> Result<Option<String>>;

    /// Persist `token` for `key`, replacing any previous value.
    ///
    /// The write must be durable when this returns.
    fn put(&self, key: &CursorKey, token: &str) -> Result<()>;
}

/// Strip one trailing line terminator (`\r\n`, `\n` or `\r`).
///
/// # Examples
///
/// ```
/// use cwlogs_tail::cursor::chomp;
///
/// assert_eq!(chomp("f/123\n"), "f/123");
/// assert_eq!(chomp("f/123\r\n"), "f/123");
/// assert_eq!(chomp("f/123\n\n"), "f/123\n");
/// assert_eq!(chomp("f/123"), "f/123");
/// ```
pub fn chomp(value: &str) -> &str {
    value
        .strip_suffix("\r\n")
        .or_else(|| value.strip_suffix('\n'))
        .or_else(|| value.strip_suffix('\r'))
        .unwrap_or(value)
}

/// Open the cursor store described by the `state` configuration section.
///
/// # Errors
///
/// Returns `CwTailError::Storage` if the backing file location or database
/// cannot be prepared.
pub fn open(config: &StateConfig) -> Result<Arc<dyn CursorStore>> {
    let store: Arc<dyn CursorStore> = match config.backend {
        StateBackend::File => Arc::new(FileCursorStore::new(&config.path)?),
        StateBackend::Embedded => Arc::new(EmbeddedCursorStore::open(&config.path)?),
    };
    Ok(store)
}

/// Cursor store kept in process memory.
///
/// Counts successful writes so callers can verify that unchanged tokens are
/// not re-persisted.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<CursorKey, String>>,
    writes: AtomicUsize,
}

impl MemoryCursorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls served so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn cursors(&self) -> std::sync::MutexGuard<'_, HashMap<CursorKey, String>> {
        self.cursors.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CursorStore for MemoryCursorStore {
    fn get(&self, key: &CursorKey) -> Result<Option<String>> {
        Ok(self.cursors().get(key).map(|t| chomp(t).to_string()))
    }

    fn put(&self, key: &CursorKey, token: &str) -> Result<()> {
        self.cursors().insert(key.clone(), token.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
