//! Scripted in-process fake of the remote log service
//!
//! [`FakeLogsApi`] replaces network I/O in tests. Stream listings are
//! configured per prefix as a list of pages, and event responses are queued
//! per stream. Every request is recorded so tests can assert on what the
//! tailer actually sent.
//!
//! When a stream's event queue is empty the fake answers like CloudWatch
//! does for an idle stream: no events and the caller's own token echoed back
//! as the forward token.
//!
//! Whole-group reads (no stream name) with nothing queued behave like
//! `FilterLogEvents`: every event appended with
//! [`FakeLogsApi::append_group_events`] inside the requested time bounds, and
//! no next token once the results are exhausted.
//!
//! # Example
//!
//! ```
//! use cwlogs_tail::logs::{EventsPage, FakeLogsApi, GetEventsRequest, LogEvent, LogsApi};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let api = FakeLogsApi::new();
//! api.push_events(Some("app"), Ok(EventsPage::new(vec![LogEvent::new(1000, "{}")], Some("T1"))));
//!
//! let request = GetEventsRequest {
//!     log_group_name: "group".to_string(),
//!     log_stream_name: Some("app".to_string()),
//!     ..Default::default()
//! };
//! let page = api.get_log_events(request).await.unwrap();
//! assert_eq!(page.next_forward_token.as_deref(), Some("T1"));
//! assert_eq!(api.event_requests().len(), 1);
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    DescribeStreamsRequest, EventsPage, GetEventsRequest, LogEvent, LogsApi, LogsApiError,
    StreamsPage,
};

#[derive(Debug, Default)]
struct FakeState {
    stream_pages: HashMap<Option<String>, Vec<Vec<String>>>,
    listing_error: Option<LogsApiError>,
    events: HashMap<Option<String>, VecDeque<Result<EventsPage, LogsApiError>>>,
    group_events: Vec<LogEvent>,
    describe_requests: Vec<DescribeStreamsRequest>,
    event_requests: Vec<GetEventsRequest>,
}

/// In-memory [`LogsApi`] with scripted responses and request recording.
#[derive(Debug, Default)]
pub struct FakeLogsApi {
    state: Mutex<FakeState>,
}

impl FakeLogsApi {
    /// Create an empty fake: no streams, idle event responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listing pages returned for a name prefix.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix the request must carry (`None` for unfiltered listings)
    /// * `pages` - Stream names per page; pages are chained with generated tokens
    pub fn set_streams(&self, prefix: Option<&str>, pages: Vec<Vec<&str>>) {
        let pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(str::to_string).collect())
            .collect();
        self.lock()
            .stream_pages
            .insert(prefix.map(str::to_string), pages);
    }

    /// Make every listing call fail with `error` until cleared with `None`.
    pub fn set_listing_error(&self, error: Option<LogsApiError>) {
        self.lock().listing_error = error;
    }

    /// Queue the response for the next event retrieval of `stream`.
    pub fn push_events(&self, stream: Option<&str>, response: Result<EventsPage, LogsApiError>) {
        self.lock()
            .events
            .entry(stream.map(str::to_string))
            .or_default()
            .push_back(response);
    }

    /// Append events to the group-wide log served to whole-group reads.
    ///
    /// Events without an id get one assigned in append order.
    pub fn append_group_events(&self, events: Vec<LogEvent>) {
        let mut state = self.lock();
        for mut event in events {
            if event.event_id.is_none() {
                event.event_id = Some(format!("evt-{}", state.group_events.len()));
            }
            state.group_events.push(event);
        }
    }

    /// All listing requests received so far.
    pub fn describe_requests(&self) -> Vec<DescribeStreamsRequest> {
        self.lock().describe_requests.clone()
    }

    /// All event retrieval requests received so far.
    pub fn event_requests(&self) -> Vec<GetEventsRequest> {
        self.lock().event_requests.clone()
    }

    /// Total number of remote calls received.
    pub fn call_count(&self) -> usize {
        let state = self.lock();
        state.describe_requests.len() + state.event_requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl LogsApi for FakeLogsApi {
    async fn describe_log_streams(
        &self,
        request: DescribeStreamsRequest,
    ) -> Result<StreamsPage, LogsApiError> {
        let mut state = self.lock();
        state.describe_requests.push(request.clone());

        if let Some(error) = &state.listing_error {
            return Err(error.clone());
        }

        let Some(pages) = state.stream_pages.get(&request.log_stream_name_prefix) else {
            return Ok(StreamsPage::default());
        };

        let index = match request.next_token.as_deref() {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| LogsApiError::Service(format!("invalid next token: {}", token)))?,
        };

        let stream_names = pages.get(index).cloned().unwrap_or_default();
        let next_token = (index + 1 < pages.len()).then(|| format!("page-{}", index + 1));

        Ok(StreamsPage {
            stream_names,
            next_token,
        })
    }

    async fn get_log_events(&self, request: GetEventsRequest) -> Result<EventsPage, LogsApiError> {
        let mut state = self.lock();
        state.event_requests.push(request.clone());

        let queued = state
            .events
            .get_mut(&request.log_stream_name)
            .and_then(VecDeque::pop_front);

        match queued {
            Some(response) => response,
            None if request.log_stream_name.is_none() => {
                let events = state
                    .group_events
                    .iter()
                    .filter(|e| request.start_time.map_or(true, |t| e.timestamp_millis >= t))
                    .filter(|e| request.end_time.map_or(true, |t| e.timestamp_millis <= t))
                    .cloned()
                    .collect();
                Ok(EventsPage {
                    events,
                    next_forward_token: None,
                })
            }
            None => Ok(EventsPage {
                events: Vec::new(),
                next_forward_token: request.next_token,
            }),
        }
    }
}
