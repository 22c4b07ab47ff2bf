//! Event decoding
//!
//! Turns a raw [`LogEvent`] into records ready for emission. Two modes exist:
//!
//! - JSON mode (no `parse` section): the payload must be a JSON object, the
//!   record time is the event timestamp in whole seconds.
//! - Parser mode: a [`parser::RecordParser`] yields zero or more records per
//!   payload. Each record takes the parser's time, or the event timestamp
//!   when the parser found none or `use_aws_timestamp` is set.
//!
//! A payload that cannot be decoded never aborts a cycle; it yields
//! [`DecodeOutcome::Failed`] carrying the raw payload byte-for-byte.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::InputConfig;
use crate::error::Result;
use crate::logs::LogEvent;

pub mod json;
pub mod parser;

use json::JsonHandler;
use parser::RecordParser;

/// Decoded record with its time in epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Record time in epoch seconds
    pub time: i64,
    /// Record fields
    pub body: Map<String, Value>,
}

/// Why an event could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{cause}")]
pub struct DecodeError {
    /// Raw payload, unmodified
    pub message: String,
    /// Human-readable cause
    pub cause: String,
}

/// Result of decoding one event.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// Records to emit, possibly none
    Records(Vec<Record>),
    /// The payload could not be decoded
    Failed {
        /// Event time in epoch seconds
        time: i64,
        /// Failure details
        error: DecodeError,
    },
}

/// Converts events into records.
pub trait Decoder: Send + Sync {
    /// Decode one event.
    fn decode(&self, event: &LogEvent) -> DecodeOutcome;
}

/// Event timestamp in whole epoch seconds, rounded toward negative infinity.
///
/// # Examples
///
/// ```
/// use cwlogs_tail::decoder::event_time_secs;
/// use cwlogs_tail::logs::LogEvent;
///
/// assert_eq!(event_time_secs(&LogEvent::new(1_700_000_000_999, "")), 1_700_000_000);
/// assert_eq!(event_time_secs(&LogEvent::new(-1, "")), -1);
/// ```
pub fn event_time_secs(event: &LogEvent) -> i64 {
    event.timestamp_millis.div_euclid(1000)
}

/// Decodes payloads as JSON objects.
pub struct JsonDecoder {
    handler: Box<dyn JsonHandler>,
}

impl JsonDecoder {
    /// Decoder using `handler`.
    pub fn new(handler: Box<dyn JsonHandler>) -> Self {
        Self { handler }
    }
}

impl Decoder for JsonDecoder {
    fn decode(&self, event: &LogEvent) -> DecodeOutcome {
        let time = event_time_secs(event);
        match self.handler.decode(&event.message) {
            Ok(body) => DecodeOutcome::Records(vec![Record { time, body }]),
            Err(e) => DecodeOutcome::Failed {
                time,
                error: DecodeError {
                    message: event.message.clone(),
                    cause: e.to_string(),
                },
            },
        }
    }
}

/// Decodes payloads with a structured parser.
pub struct ParserDecoder {
    parser: Box<dyn RecordParser>,
    use_aws_timestamp: bool,
}

impl ParserDecoder {
    /// Decoder using `parser`; `use_aws_timestamp` forces the event time.
    pub fn new(parser: Box<dyn RecordParser>, use_aws_timestamp: bool) -> Self {
        Self {
            parser,
            use_aws_timestamp,
        }
    }
}

impl Decoder for ParserDecoder {
    fn decode(&self, event: &LogEvent) -> DecodeOutcome {
        let event_time = event_time_secs(event);

        match self.parser.parse(&event.message) {
            Ok(parsed) => DecodeOutcome::Records(
                parsed
                    .into_iter()
                    .map(|record| Record {
                        time: match record.time {
                            Some(time) if !self.use_aws_timestamp => time,
                            _ => event_time,
                        },
                        body: record.body,
                    })
                    .collect(),
            ),
            Err(e) => DecodeOutcome::Failed {
                time: event_time,
                error: DecodeError {
                    message: event.message.clone(),
                    cause: e.to_string(),
                },
            },
        }
    }
}

/// Build the decoder for an input section.
///
/// # Errors
///
/// Returns `CwTailError::Config` if the parser cannot be built.
pub fn from_config(input: &InputConfig) -> Result<Box<dyn Decoder>> {
    let decoder: Box<dyn Decoder> = match &input.parse {
        Some(parse) => Box::new(ParserDecoder::new(
            parser::from_config(parse)?,
            input.use_aws_timestamp,
        )),
        None => Box::new(JsonDecoder::new(json::handler_for(input.json_handler))),
    };
    Ok(decoder)
}
