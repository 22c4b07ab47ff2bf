//! Remote log service abstraction
//!
//! This module defines the [`LogsApi`] trait covering the two remote
//! operations the tailer needs: listing log streams (paginated) and
//! retrieving log events for one stream. Concrete implementations live in
//! submodules:
//!
//! - [`cloudwatch::CloudWatchLogsClient`] -- AWS SDK backed client.
//! - `fake::FakeLogsApi` -- scripted in-process fake used in tests, built
//!   with the `test-utils` feature.
//!
//! Request and response types are plain structs owned by this crate so that
//! nothing above this module depends on SDK types.

use async_trait::async_trait;
use thiserror::Error;

pub mod cloudwatch;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use cloudwatch::CloudWatchLogsClient;
#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakeLogsApi;

/// A single log event as returned by the remote service.
///
/// Events are immutable and are passed through the pipeline in the order the
/// service returned them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Event timestamp in epoch milliseconds
    pub timestamp_millis: i64,

    /// Raw event payload
    pub message: String,

    /// Time the service ingested the event, in epoch milliseconds
    pub ingestion_time: Option<i64>,

    /// Service-assigned event id; only group-wide reads report one
    pub event_id: Option<String>,
}

impl LogEvent {
    /// Create an event with the given timestamp and payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use cwlogs_tail::logs::LogEvent;
    ///
    /// let event = LogEvent::new(1_700_000_000_123, r#"{"level":"info"}"#);
    /// assert_eq!(event.timestamp_millis, 1_700_000_000_123);
    /// assert!(event.ingestion_time.is_none());
    /// ```
    pub fn new(timestamp_millis: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp_millis,
            message: message.into(),
            ingestion_time: None,
            event_id: None,
        }
    }

    /// Attach the service-assigned event id.
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }
}

/// Request for one page of the log stream listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeStreamsRequest {
    /// Log group to list streams in
    pub log_group_name: String,

    /// Only return streams whose name starts with this prefix
    pub log_stream_name_prefix: Option<String>,

    /// Continuation token from the previous page
    pub next_token: Option<String>,
}

/// One page of the log stream listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamsPage {
    /// Stream names on this page, in service order
    pub stream_names: Vec<String>,

    /// Token for the next page; `None` when the listing is exhausted
    pub next_token: Option<String>,
}

/// Request for new events of one stream.
///
/// `next_token` is only ever `Some` with a non-empty value; an absent cursor
/// leaves the field out of the remote request entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetEventsRequest {
    /// Log group the stream belongs to
    pub log_group_name: String,

    /// Stream to read; `None` reads the whole group without stream filtering
    pub log_stream_name: Option<String>,

    /// Lower time bound in epoch milliseconds
    pub start_time: Option<i64>,

    /// Upper time bound in epoch milliseconds
    pub end_time: Option<i64>,

    /// Stored continuation token to resume from. For whole-group reads this
    /// is the pagination token of the current read, never a stored cursor.
    pub next_token: Option<String>,

    /// Read from the oldest event when no token is given
    pub start_from_head: bool,
}

/// Response of a single event retrieval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsPage {
    /// Events in service order
    pub events: Vec<LogEvent>,

    /// Forward continuation token to persist for the next fetch. For
    /// whole-group reads this is the next page token and is `None` once the
    /// results are exhausted.
    pub next_forward_token: Option<String>,
}

impl EventsPage {
    /// Create a page from events and a forward token.
    pub fn new(events: Vec<LogEvent>, next_forward_token: Option<&str>) -> Self {
        Self {
            events,
            next_forward_token: next_forward_token.map(str::to_string),
        }
    }
}

/// Errors reported by a [`LogsApi`] implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogsApiError {
    /// The log group or log stream does not exist
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The service rejected the request
    #[error("Service error: {0}")]
    Service(String),

    /// The request never produced a service response (network, timeout, credentials)
    #[error("Transport error: {0}")]
    Transport(String),
}

impl LogsApiError {
    /// Returns `true` when the error means the stream or group is missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ResourceNotFound(_))
    }
}

/// Remote log service operations used by the tailer.
///
/// Implementations must be usable behind `Arc<dyn LogsApi>`; the scheduler
/// calls them strictly sequentially.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogsApi: Send + Sync {
    /// Fetch one page of log streams in a log group.
    async fn describe_log_streams(
        &self,
        request: DescribeStreamsRequest,
    ) -> Result<StreamsPage, LogsApiError>;

    /// Fetch new events for one stream (or the whole group).
    async fn get_log_events(&self, request: GetEventsRequest) -> Result<EventsPage, LogsApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_api_error_display() {
        let err = LogsApiError::ResourceNotFound("log group /app".to_string());
        assert_eq!(err.to_string(), "Resource not found: log group /app");

        let err = LogsApiError::Service("throttled".to_string());
        assert_eq!(err.to_string(), "Service error: throttled");

        let err = LogsApiError::Transport("connection reset".to_string());
        assert_eq!(err.to_string(), "Transport error: connection reset");
    }

    #[test]
    fn test_is_not_found() {
        assert!(LogsApiError::ResourceNotFound(String::new()).is_not_found());
        assert!(!LogsApiError::Service(String::new()).is_not_found());
        assert!(!LogsApiError::Transport(String::new()).is_not_found());
    }

    #[test]
    fn test_events_page_new() {
        let page = EventsPage::new(vec![LogEvent::new(1, "a")], Some("f/123"));
        assert_eq!(page.events.len(), 1);
        assert_eq!(page.next_forward_token.as_deref(), Some("f/123"));
    }

    #[test]
    fn test_log_event_with_event_id() {
        let event = LogEvent::new(1, "a").with_event_id("e-1");
        assert_eq!(event.event_id.as_deref(), Some("e-1"));
        assert!(LogEvent::new(1, "a").event_id.is_none());
    }
}
