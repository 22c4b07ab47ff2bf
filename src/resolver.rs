//! Log stream resolution
//!
//! Decides which streams a poll cycle reads. Three selection modes exist:
//!
//! - explicit: one configured stream name, or the whole group when unset
//! - prefix: every stream whose name starts with the configured prefix
//! - date-prefixed: every stream prefixed with today's date followed by every
//!   stream prefixed with yesterday's date (late writers to yesterday's
//!   stream are still picked up shortly after midnight)
//!
//! Listing goes through [`crate::pager::collect_all`]. A missing log group or
//! stream is reported as [`Discovery::NotFound`] so the scheduler can skip
//! the cycle instead of failing.

use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::debug;

use crate::cursor::CursorKey;
use crate::logs::{DescribeStreamsRequest, LogsApi, LogsApiError};
use crate::pager::{self, Page};

/// How the streams of a cycle are chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSelection {
    /// Exactly this stream; `None` reads the whole group.
    Explicit(Option<String>),
    /// All streams starting with the prefix; `None` lists every stream.
    Prefix(Option<String>),
    /// Streams prefixed with today's and then yesterday's date.
    DatePrefixed {
        /// `strftime` format of the date prefix
        format: String,
    },
}

impl fmt::Display for StreamSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit(Some(name)) => write!(f, "stream '{}'", name),
            Self::Explicit(None) => write!(f, "whole log group"),
            Self::Prefix(Some(prefix)) => write!(f, "streams prefixed '{}'", prefix),
            Self::Prefix(None) => write!(f, "all streams"),
            Self::DatePrefixed { format } => write!(f, "date-prefixed streams ('{}')", format),
        }
    }
}

/// A stream to fetch from in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedStream {
    name: Option<String>,
}

impl ResolvedStream {
    /// A named stream.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }

    /// The whole log group without stream filtering.
    pub fn whole_group() -> Self {
        Self { name: None }
    }

    /// Stream name, `None` for the whole group.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Key the stream's cursor is stored under.
    pub fn cursor_key(&self) -> CursorKey {
        CursorKey::for_stream(self.name())
    }
}

impl fmt::Display for ResolvedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "<all streams>"),
        }
    }
}

/// Result of resolving the streams of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// Streams to fetch, in order
    Streams(Vec<ResolvedStream>),
    /// The log group or a listed stream does not exist
    NotFound(String),
    /// Listing failed for another reason
    Failed(LogsApiError),
}

/// Source of the current calendar date.
pub trait Clock: Send + Sync {
    /// Today's date.
    fn today(&self) -> NaiveDate;
}

/// Local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Resolves the configured selection into concrete streams.
pub struct StreamResolver {
    api: Arc<dyn LogsApi>,
    log_group_name: String,
    selection: StreamSelection,
    max_pages: Option<usize>,
}

impl StreamResolver {
    /// Create a resolver for one log group.
    ///
    /// # Arguments
    ///
    /// * `api` - Remote log service
    /// * `log_group_name` - Group the streams belong to
    /// * `selection` - Selection mode
    /// * `max_pages` - Optional cap on listing pages per prefix
    pub fn new(
        api: Arc<dyn LogsApi>,
        log_group_name: impl Into<String>,
        selection: StreamSelection,
        max_pages: Option<usize>,
    ) -> Self {
        Self {
            api,
            log_group_name: log_group_name.into(),
            selection,
            max_pages,
        }
    }

    /// Selection mode of this resolver.
    pub fn selection(&self) -> &StreamSelection {
        &self.selection
    }

    /// Resolve the streams for a cycle running on `today`.
    ///
    /// The explicit mode never calls the remote service.
    pub async fn resolve(&self, today: NaiveDate) -> Discovery {
        match &self.selection {
            StreamSelection::Explicit(name) => Discovery::Streams(vec![ResolvedStream {
                name: name.clone(),
            }]),
            StreamSelection::Prefix(prefix) => self.discover(&[prefix.clone()]).await,
            StreamSelection::DatePrefixed { format } => {
                self.discover(&date_prefixes(today, format)).await
            }
        }
    }

    async fn discover(&self, prefixes: &[Option<String>]) -> Discovery {
        let mut streams = Vec::new();

        for prefix in prefixes {
            match self.list_streams(prefix.as_deref()).await {
                Ok(names) => {
                    debug!(
                        log_group = %self.log_group_name,
                        prefix = prefix.as_deref().unwrap_or(""),
                        count = names.len(),
                        "Listed log streams"
                    );
                    streams.extend(names.into_iter().map(ResolvedStream::named));
                }
                Err(e) if e.is_not_found() => return Discovery::NotFound(e.to_string()),
                Err(e) => return Discovery::Failed(e),
            }
        }

        Discovery::Streams(streams)
    }

    /// List every stream name with the given prefix, following continuation
    /// tokens until exhausted or the page cap is hit.
    ///
    /// # Errors
    ///
    /// Returns the first error of any listing page.
    pub async fn list_streams(&self, prefix: Option<&str>) -> Result<Vec<String>, LogsApiError> {
        let api = &self.api;
        let log_group_name = &self.log_group_name;

        pager::collect_all(
            |next_token| {
                let request = DescribeStreamsRequest {
                    log_group_name: log_group_name.clone(),
                    log_stream_name_prefix: prefix.map(str::to_string),
                    next_token,
                };
                async move {
                    api.describe_log_streams(request).await.map(|page| Page {
                        items: page.stream_names,
                        next_token: page.next_token,
                    })
                }
            },
            self.max_pages,
        )
        .await
    }
}

/// Today's prefix followed by yesterday's; a format that renders both days
/// identically yields a single prefix.
fn date_prefixes(today: NaiveDate, format: &str) -> Vec<Option<String>> {
    let mut prefixes = vec![Some(today.format(format).to_string())];

    if let Some(yesterday) = today.pred_opt() {
        let prefix = Some(yesterday.format(format).to_string());
        if !prefixes.contains(&prefix) {
            prefixes.push(prefix);
        }
    }

    prefixes
}
