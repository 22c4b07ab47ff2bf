//! Polling scheduler
//!
//! The scheduler owns one input instance and drives its cycles:
//!
//! 1. Idle: check the shutdown flag, sleep one tick.
//! 2. When the next due time has passed, advance it by exactly one fetch
//!    interval and run a poll cycle: resolve streams, then for each stream in
//!    order fetch, decode and emit.
//! 3. Shutdown: the flag was observed; the loop exits.
//!
//! Cycles never overlap and streams within a cycle are fetched one after
//! another. Shutdown is cooperative and never interrupts a running cycle.
//! Runtime faults stay local: a missing log group skips the cycle, a failed
//! fetch skips one stream, a bad payload is emitted through the error path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::InputConfig;
use crate::cursor::CursorStore;
use crate::decoder::{self, DecodeOutcome, Decoder};
use crate::emitter::Emitter;
use crate::error::Result;
use crate::fetcher::EventFetcher;
use crate::logs::{LogEvent, LogsApi};
use crate::resolver::{Clock, Discovery, ResolvedStream, StreamResolver, SystemClock};

/// Scheduler lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Waiting for the next due time
    Idle,
    /// Running a poll cycle
    Polling,
    /// Shutdown observed; the loop has exited
    Shutdown,
}

/// Cooperative shutdown flag shared with the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Request shutdown; honoured at the scheduler's next idle check.
    pub fn shutdown(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown was requested.
    pub fn is_shutdown(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Counters of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Streams resolved for the cycle
    pub streams: usize,
    /// Streams whose fetch failed
    pub failed_streams: usize,
    /// Events fetched
    pub events: usize,
    /// Records emitted
    pub records: usize,
    /// Events emitted through the error path
    pub decode_errors: usize,
    /// The log group or stream listing reported not-found
    pub not_found: bool,
    /// Stream listing failed for another reason
    pub discovery_failed: bool,
}

/// Drives poll cycles for one input instance.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use cwlogs_tail::config::InputConfig;
/// use cwlogs_tail::cursor::MemoryCursorStore;
/// use cwlogs_tail::emitter::ChannelEmitter;
/// use cwlogs_tail::logs::{EventsPage, FakeLogsApi, LogEvent};
/// use cwlogs_tail::scheduler::Scheduler;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let mut input = InputConfig::default();
/// input.log_group_name = "/aws/lambda/app".to_string();
/// input.log_stream_name = Some("app".to_string());
///
/// let api = Arc::new(FakeLogsApi::new());
/// api.push_events(
///     Some("app"),
///     Ok(EventsPage::new(vec![LogEvent::new(1_000, r#"{"ok":true}"#)], Some("T1"))),
/// );
///
/// let (emitter, mut rx) = ChannelEmitter::new();
/// let scheduler = Scheduler::new(&input, api, Arc::new(MemoryCursorStore::new()), Arc::new(emitter))?;
///
/// let report = scheduler.poll_cycle().await;
/// assert_eq!(report.records, 1);
/// assert!(rx.recv().await.is_some());
/// # Ok(())
/// # }
/// ```
pub struct Scheduler {
    tag: String,
    resolver: StreamResolver,
    fetcher: EventFetcher,
    decoder: Box<dyn Decoder>,
    emitter: Arc<dyn Emitter>,
    clock: Arc<dyn Clock>,
    fetch_interval: Duration,
    tick: Duration,
    state: SchedulerState,
    shutdown: ShutdownHandle,
}

impl Scheduler {
    /// Create a scheduler for one input section.
    ///
    /// The configuration is validated before anything else, so an invalid
    /// input never reaches the remote service.
    ///
    /// # Arguments
    ///
    /// * `input` - Input configuration
    /// * `api` - Remote log service
    /// * `cursors` - Cursor store
    /// * `emitter` - Downstream sink
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Config` for an invalid input section.
    pub fn new(
        input: &InputConfig,
        api: Arc<dyn LogsApi>,
        cursors: Arc<dyn CursorStore>,
        emitter: Arc<dyn Emitter>,
    ) -> Result<Self> {
        input.validate()?;
        let time_range = input.time_range()?;
        let decoder = decoder::from_config(input)?;

        let resolver = StreamResolver::new(
            api.clone(),
            input.log_group_name.clone(),
            input.stream_selection(),
            input.max_pages,
        );
        let fetcher = EventFetcher::new(
            api,
            cursors,
            input.log_group_name.clone(),
            time_range,
            input.start_from_head,
        )
        .with_max_pages(input.max_pages);

        Ok(Self {
            tag: input.tag.clone(),
            resolver,
            fetcher,
            decoder,
            emitter,
            clock: Arc::new(SystemClock),
            fetch_interval: Duration::from_secs(input.fetch_interval_secs),
            tick: Duration::from_millis(input.tick_millis),
            state: SchedulerState::Idle,
            shutdown: ShutdownHandle::default(),
        })
    }

    /// Replace the date source used by date-prefixed stream selection.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Handle to request shutdown from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Run cycles until shutdown is requested.
    ///
    /// The first cycle starts immediately. Each later cycle is due exactly
    /// one interval after the previous due time; a cycle that overruns the
    /// interval is followed by the next one at the next tick.
    pub async fn run(&mut self) {
        info!(
            tag = %self.tag,
            selection = %self.resolver.selection(),
            fetch_interval_secs = self.fetch_interval.as_secs(),
            "Starting CloudWatch Logs tailer"
        );

        let mut next_due = Instant::now();
        let mut cycles: u64 = 0;

        loop {
            if self.shutdown.is_shutdown() {
                break;
            }

            if Instant::now() >= next_due {
                next_due += self.fetch_interval;
                cycles += 1;

                self.state = SchedulerState::Polling;
                let report = self.poll_cycle().await;
                self.state = SchedulerState::Idle;

                debug!(cycle = cycles, ?report, "Poll cycle finished");
            }

            tokio::time::sleep(self.tick).await;
        }

        self.state = SchedulerState::Shutdown;
        info!(cycles, "CloudWatch Logs tailer stopped");
    }

    /// Run one poll cycle: resolve, then fetch, decode and emit per stream.
    pub async fn poll_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let streams = match self.resolver.resolve(self.clock.today()).await {
            Discovery::Streams(streams) => streams,
            Discovery::NotFound(detail) => {
                warn!(
                    selection = %self.resolver.selection(),
                    error = %detail,
                    "Log group or stream not found, skipping cycle"
                );
                report.not_found = true;
                return report;
            }
            Discovery::Failed(e) => {
                error!(
                    selection = %self.resolver.selection(),
                    error = %e,
                    "Failed to list log streams, skipping cycle"
                );
                report.discovery_failed = true;
                return report;
            }
        };

        report.streams = streams.len();

        for stream in &streams {
            let events = match self.fetcher.fetch(stream).await {
                Ok(events) => events,
                Err(e) => {
                    error!(
                        stream = %stream,
                        error = %e,
                        "Failed to fetch events, retrying next cycle"
                    );
                    report.failed_streams += 1;
                    continue;
                }
            };

            report.events += events.len();
            for event in &events {
                self.dispatch(stream, event, &mut report);
            }
        }

        report
    }

    fn dispatch(&self, stream: &ResolvedStream, event: &LogEvent, report: &mut CycleReport) {
        match self.decoder.decode(event) {
            DecodeOutcome::Records(records) => {
                for record in records {
                    self.emitter.emit(&self.tag, record.time, &record.body);
                    report.records += 1;
                }
            }
            DecodeOutcome::Failed { time, error } => {
                error!(
                    stream = %stream,
                    payload = %error.message,
                    cause = %error.cause,
                    "Failed to decode log event"
                );

                let mut body = Map::new();
                body.insert("message".to_string(), Value::String(error.message));
                self.emitter.emit_error(&self.tag, time, &body, &error.cause);
                report.decode_errors += 1;
            }
        }
    }
}
