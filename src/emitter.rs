//! Downstream record sinks
//!
//! Emission is fire-and-forget: sinks report their own delivery problems in
//! the log and never fail the cycle that produced the record.

use std::io::{self, Write};
use std::sync::Mutex;

use serde_json::{json, Map, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::warn;

/// Receives decoded records and decode failures.
pub trait Emitter: Send + Sync {
    /// Emit a decoded record.
    fn emit(&self, tag: &str, time: i64, record: &Map<String, Value>);

    /// Emit the raw payload of an event that failed to decode.
    fn emit_error(&self, tag: &str, time: i64, record: &Map<String, Value>, cause: &str);
}

/// Writes one JSON document per line.
///
/// Records go to the record writer as `{"tag","time","record"}`; decode
/// failures go to the error writer with an extra `"error"` field.
pub struct JsonLinesEmitter {
    records: Mutex<Box<dyn Write + Send>>,
    errors: Mutex<Box<dyn Write + Send>>,
}

impl JsonLinesEmitter {
    /// Emitter over arbitrary writers.
    pub fn new(records: Box<dyn Write + Send>, errors: Box<dyn Write + Send>) -> Self {
        Self {
            records: Mutex::new(records),
            errors: Mutex::new(errors),
        }
    }

    /// Records to STDOUT, decode failures to STDERR.
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    fn write_line(target: &Mutex<Box<dyn Write + Send>>, line: &Value) {
        let mut writer = target.lock().unwrap_or_else(|e| e.into_inner());
        let result = serde_json::to_writer(&mut *writer, line)
            .map_err(io::Error::from)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush());

        if let Err(e) = result {
            warn!(error = %e, "Failed to write emitted record");
        }
    }
}

impl Emitter for JsonLinesEmitter {
    fn emit(&self, tag: &str, time: i64, record: &Map<String, Value>) {
        let line = json!({ "tag": tag, "time": time, "record": record });
        Self::write_line(&self.records, &line);
    }

    fn emit_error(&self, tag: &str, time: i64, record: &Map<String, Value>, cause: &str) {
        let line = json!({ "tag": tag, "time": time, "record": record, "error": cause });
        Self::write_line(&self.errors, &line);
    }
}

/// One emitted item, as delivered by [`ChannelEmitter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// A decoded record
    Record {
        /// Instance tag
        tag: String,
        /// Record time in epoch seconds
        time: i64,
        /// Record fields
        record: Map<String, Value>,
    },
    /// A decode failure
    Error {
        /// Instance tag
        tag: String,
        /// Event time in epoch seconds
        time: i64,
        /// `{"message": raw payload}`
        record: Map<String, Value>,
        /// Failure cause
        cause: String,
    },
}

/// Forwards emissions into an unbounded channel.
///
/// Used to embed the tailer in a larger async program and to observe
/// emissions in tests.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: UnboundedSender<Emission>,
}

impl ChannelEmitter {
    /// Create the emitter and the receiving end of its channel.
    pub fn new() -> (Self, UnboundedReceiver<Emission>) {
        let (sender, receiver) = unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, emission: Emission) {
        if self.sender.send(emission).is_err() {
            warn!("Emission receiver dropped; record discarded");
        }
    }
}

impl Emitter for ChannelEmitter {
    fn emit(&self, tag: &str, time: i64, record: &Map<String, Value>) {
        self.send(Emission::Record {
            tag: tag.to_string(),
            time,
            record: record.clone(),
        });
    }

    fn emit_error(&self, tag: &str, time: i64, record: &Map<String, Value>, cause: &str) {
        self.send(Emission::Error {
            tag: tag.to_string(),
            time,
            record: record.clone(),
            cause: cause.to_string(),
        });
    }
}
