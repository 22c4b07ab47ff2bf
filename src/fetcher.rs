//! Per-stream event retrieval with cursor bookkeeping
//!
//! One fetch is: load the stream's cursor, request events after it (or from
//! the start of the time range when there is none), then persist the forward
//! token the service returned if it differs from the stored one.
//!
//! Whole-group reads have no durable forward token. Their cursor is a
//! [`GroupWatermark`] instead: the newest event timestamp seen plus the ids
//! of the events at that timestamp. The next read starts at that timestamp
//! and drops the events it has already returned.
//!
//! The cursor is written before the events are handed to the decoder. A
//! crash between the write and emission loses that batch; a failed write
//! fails the fetch, so nothing is emitted and the next cycle re-reads the
//! batch from the old cursor.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::config::TimeRange;
use crate::cursor::{chomp, CursorStore};
use crate::error::{CwTailError, Result};
use crate::logs::{GetEventsRequest, LogEvent, LogsApi};
use crate::pager::{self, Page};
use crate::resolver::ResolvedStream;

/// Fetches new events of a stream and advances its cursor.
pub struct EventFetcher {
    api: Arc<dyn LogsApi>,
    cursors: Arc<dyn CursorStore>,
    log_group_name: String,
    time_range: TimeRange,
    start_from_head: bool,
    max_pages: Option<usize>,
}

impl EventFetcher {
    /// Create a fetcher for one log group.
    pub fn new(
        api: Arc<dyn LogsApi>,
        cursors: Arc<dyn CursorStore>,
        log_group_name: impl Into<String>,
        time_range: TimeRange,
        start_from_head: bool,
    ) -> Self {
        Self {
            api,
            cursors,
            log_group_name: log_group_name.into(),
            time_range,
            start_from_head,
            max_pages: None,
        }
    }

    /// Cap the number of pages a whole-group read follows.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Retrieve the events written to `stream` since its stored cursor.
    ///
    /// # Returns
    ///
    /// Events in service order; empty when nothing new was written.
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Api` when the remote call fails and
    /// `CwTailError::Storage` when the cursor cannot be read or written. The
    /// cursor is left unchanged in both cases.
    pub async fn fetch(&self, stream: &ResolvedStream) -> Result<Vec<LogEvent>> {
        match stream.name() {
            Some(_) => self.fetch_stream(stream).await,
            None => self.fetch_group(stream).await,
        }
    }

    async fn fetch_stream(&self, stream: &ResolvedStream) -> Result<Vec<LogEvent>> {
        let key = stream.cursor_key();
        let previous = self.cursors.get(&key)?;

        let request = GetEventsRequest {
            log_group_name: self.log_group_name.clone(),
            log_stream_name: stream.name().map(str::to_string),
            start_time: self.time_range.start_millis(),
            end_time: self.time_range.end_millis(),
            next_token: previous.clone().filter(|token| !token.is_empty()),
            start_from_head: self.start_from_head,
        };

        trace!(stream = %stream, has_cursor = request.next_token.is_some(), "Fetching events");

        let page = self
            .api
            .get_log_events(request)
            .await
            .map_err(CwTailError::from)?;

        if let Some(token) = page.next_forward_token.as_deref() {
            if token_advanced(previous.as_deref(), token) {
                self.cursors.put(&key, token)?;
                debug!(stream = %stream, "Cursor advanced");
            }
        }

        debug!(stream = %stream, events = page.events.len(), "Fetched events");

        Ok(page.events)
    }

    async fn fetch_group(&self, stream: &ResolvedStream) -> Result<Vec<LogEvent>> {
        let key = stream.cursor_key();
        let previous = self.cursors.get(&key)?;

        let watermark = previous.as_deref().and_then(GroupWatermark::decode);
        if watermark.is_none() && previous.as_deref().is_some_and(|v| !chomp(v).is_empty()) {
            warn!(stream = %stream, "Ignoring unreadable group cursor, reading from range start");
        }

        let start_time = match (&watermark, self.time_range.start_millis()) {
            (Some(mark), Some(start)) => Some(mark.timestamp_millis.max(start)),
            (Some(mark), None) => Some(mark.timestamp_millis),
            (None, start) => start,
        };

        trace!(stream = %stream, has_cursor = watermark.is_some(), "Fetching group events");

        let api = &self.api;
        let log_group_name = &self.log_group_name;
        let end_time = self.time_range.end_millis();
        let start_from_head = self.start_from_head;

        let events = pager::collect_all(
            |next_token| {
                let request = GetEventsRequest {
                    log_group_name: log_group_name.clone(),
                    log_stream_name: None,
                    start_time,
                    end_time,
                    next_token,
                    start_from_head,
                };
                async move {
                    api.get_log_events(request).await.map(|page| Page {
                        items: page.events,
                        next_token: page.next_forward_token,
                    })
                }
            },
            self.max_pages,
        )
        .await
        .map_err(CwTailError::from)?;

        let fresh: Vec<LogEvent> = match &watermark {
            Some(mark) => events.into_iter().filter(|e| !mark.covers(e)).collect(),
            None => events,
        };

        if let Some(next) = GroupWatermark::advance(watermark, &fresh) {
            let encoded = next.encode()?;
            if token_advanced(previous.as_deref(), &encoded) {
                self.cursors.put(&key, &encoded)?;
                debug!(stream = %stream, timestamp = next.timestamp_millis, "Cursor advanced");
            }
        }

        debug!(stream = %stream, events = fresh.len(), "Fetched events");

        Ok(fresh)
    }
}

/// Progress marker of a whole-group read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupWatermark {
    /// Newest event timestamp returned so far, in epoch milliseconds
    pub timestamp_millis: i64,

    /// Ids of the returned events carrying exactly that timestamp
    pub event_ids: Vec<String>,
}

impl GroupWatermark {
    /// Parse a stored cursor value; `None` for empty or foreign values.
    pub fn decode(value: &str) -> Option<Self> {
        serde_json::from_str(chomp(value)).ok()
    }

    /// Render the cursor value to store.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether `event` was already returned by an earlier read.
    pub fn covers(&self, event: &LogEvent) -> bool {
        event.timestamp_millis < self.timestamp_millis
            || (event.timestamp_millis == self.timestamp_millis
                && self.event_ids.contains(&event_key(event)))
    }

    /// Move the watermark past `events`. `None` only when there was no
    /// watermark and nothing was read.
    pub fn advance(previous: Option<Self>, events: &[LogEvent]) -> Option<Self> {
        let mut mark = previous;

        for event in events {
            let key = event_key(event);

            if let Some(current) = mark.as_mut() {
                if event.timestamp_millis < current.timestamp_millis {
                    continue;
                }
                if event.timestamp_millis == current.timestamp_millis {
                    if !current.event_ids.contains(&key) {
                        current.event_ids.push(key);
                    }
                    continue;
                }
            }

            mark = Some(Self {
                timestamp_millis: event.timestamp_millis,
                event_ids: vec![key],
            });
        }

        mark
    }
}

fn event_key(event: &LogEvent) -> String {
    event
        .event_id
        .clone()
        .unwrap_or_else(|| event.message.clone())
}

/// Whether `next` differs from the stored token once line terminators are
/// trimmed. An absent stored token always counts as different.
pub fn token_advanced(previous: Option<&str>, next: &str) -> bool {
    previous.map(chomp) != Some(chomp(next))
}
