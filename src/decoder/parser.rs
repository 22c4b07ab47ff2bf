//! Structured parsers for non-JSON payloads

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ParseConfig;
use crate::error::{CwTailError, Result};

/// Errors produced by a [`RecordParser`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The payload does not match the expression
    #[error("pattern not matched")]
    NoMatch,

    /// The time field could not be read
    #[error("invalid time '{value}': {reason}")]
    Time {
        /// Captured time text
        value: String,
        /// Parser message
        reason: String,
    },
}

/// A record produced by a parser, with the time it found, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    /// Record time in epoch seconds
    pub time: Option<i64>,
    /// Record fields
    pub body: Map<String, Value>,
}

/// Turns a raw payload into zero or more records.
pub trait RecordParser: Send + Sync {
    /// Parse one payload.
    fn parse(&self, message: &str) -> std::result::Result<Vec<ParsedRecord>, ParseError>;
}

/// Keeps the whole payload under one key.
#[derive(Debug, Clone)]
pub struct RawParser {
    message_key: String,
}

impl RawParser {
    /// Parser storing the payload under `message_key`.
    pub fn new(message_key: impl Into<String>) -> Self {
        Self {
            message_key: message_key.into(),
        }
    }
}

impl RecordParser for RawParser {
    fn parse(&self, message: &str) -> std::result::Result<Vec<ParsedRecord>, ParseError> {
        let mut body = Map::new();
        body.insert(self.message_key.clone(), Value::String(message.to_string()));
        Ok(vec![ParsedRecord { time: None, body }])
    }
}

/// Named capture groups become record fields.
///
/// Every non-overlapping match in the payload yields one record, so a payload
/// carrying several lines yields several records when the expression is
/// anchored per line (`(?m)`).
///
/// # Examples
///
/// ```
/// use cwlogs_tail::decoder::parser::{RecordParser, RegexParser};
///
/// let parser = RegexParser::new(r"(?P<level>[A-Z]+) (?P<msg>.+)", None, None).unwrap();
/// let records = parser.parse("WARN disk almost full").unwrap();
/// assert_eq!(records[0].body["level"], "WARN");
/// assert_eq!(records[0].body["msg"], "disk almost full");
/// ```
#[derive(Debug, Clone)]
pub struct RegexParser {
    regex: Regex,
    time_key: Option<String>,
    time_format: Option<String>,
}

impl RegexParser {
    /// Compile a parser.
    ///
    /// # Arguments
    ///
    /// * `expression` - Regular expression with named capture groups
    /// * `time_key` - Capture holding the record time; removed from the record
    /// * `time_format` - `strftime` format of the time capture; epoch seconds when `None`.
    ///   Values without an offset are read as local time
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Config` if the expression does not compile.
    pub fn new(
        expression: &str,
        time_key: Option<String>,
        time_format: Option<String>,
    ) -> Result<Self> {
        let regex = Regex::new(expression)
            .map_err(|e| CwTailError::Config(format!("Invalid parse expression: {}", e)))?;
        Ok(Self {
            regex,
            time_key,
            time_format,
        })
    }

    fn parse_time(&self, value: &str) -> std::result::Result<i64, ParseError> {
        let invalid = |reason: String| ParseError::Time {
            value: value.to_string(),
            reason,
        };

        match &self.time_format {
            Some(format) => {
                if let Ok(t) = DateTime::parse_from_str(value, format) {
                    return Ok(t.timestamp());
                }

                // Without an offset the value is local time, like time range bounds.
                let naive = NaiveDateTime::parse_from_str(value, format)
                    .map_err(|e| invalid(e.to_string()))?;
                Local
                    .from_local_datetime(&naive)
                    .earliest()
                    .map(|t| t.timestamp())
                    .ok_or_else(|| invalid("does not exist in local time".to_string()))
            }
            None => value
                .trim()
                .parse::<f64>()
                .map(|secs| secs.floor() as i64)
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

impl RecordParser for RegexParser {
    fn parse(&self, message: &str) -> std::result::Result<Vec<ParsedRecord>, ParseError> {
        let mut records = Vec::new();

        for captures in self.regex.captures_iter(message) {
            let mut body = Map::new();
            let mut time = None;

            for name in self.regex.capture_names().flatten() {
                let Some(value) = captures.name(name) else {
                    continue;
                };

                if self.time_key.as_deref() == Some(name) {
                    time = Some(self.parse_time(value.as_str())?);
                } else {
                    body.insert(name.to_string(), Value::String(value.as_str().to_string()));
                }
            }

            records.push(ParsedRecord { time, body });
        }

        if records.is_empty() {
            return Err(ParseError::NoMatch);
        }

        Ok(records)
    }
}

/// Build the parser described by a `parse` configuration section.
///
/// # Errors
///
/// Returns `CwTailError::Config` for an invalid expression.
pub fn from_config(config: &ParseConfig) -> Result<Box<dyn RecordParser>> {
    let parser: Box<dyn RecordParser> = match config {
        ParseConfig::Raw { message_key } => Box::new(RawParser::new(message_key.clone())),
        ParseConfig::Regex {
            expression,
            time_key,
            time_format,
        } => Box::new(RegexParser::new(
            expression,
            time_key.clone(),
            time_format.clone(),
        )?),
    };
    Ok(parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_parser_wraps_payload() {
        let records = RawParser::new("log").parse("plain text").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time, None);
        assert_eq!(records[0].body["log"], "plain text");
    }

    #[test]
    fn test_regex_parser_no_match() {
        let parser = RegexParser::new(r"^(?P<code>\d{3}) ", None, None).unwrap();
        assert_eq!(parser.parse("no status here"), Err(ParseError::NoMatch));
    }

    #[test]
    fn test_regex_parser_multi_record() {
        let parser = RegexParser::new(r"(?m)^(?P<level>\w+): (?P<msg>.*)$", None, None).unwrap();
        let records = parser.parse("INFO: started\nERROR: failed").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].body["level"], "INFO");
        assert_eq!(records[1].body["msg"], "failed");
    }

    #[test]
    fn test_regex_parser_epoch_time_key() {
        let parser = RegexParser::new(
            r"^(?P<ts>\d+(\.\d+)?) (?P<msg>.*)$",
            Some("ts".to_string()),
            None,
        )
        .unwrap();
        let records = parser.parse("1700000000.75 hello").unwrap();
        assert_eq!(records[0].time, Some(1_700_000_000));
        assert!(!records[0].body.contains_key("ts"));
        assert_eq!(records[0].body["msg"], "hello");
    }

    #[test]
    fn test_regex_parser_formatted_time_key() {
        let parser = RegexParser::new(
            r"^\[(?P<time>[^\]]+)\] (?P<msg>.*)$",
            Some("time".to_string()),
            Some("%Y-%m-%d %H:%M:%S".to_string()),
        )
        .unwrap();
        let records = parser.parse("[2024-01-01 00:00:10] boot").unwrap();

        let naive = NaiveDateTime::parse_from_str("2024-01-01 00:00:10", "%Y-%m-%d %H:%M:%S")
            .unwrap();
        let expected = Local.from_local_datetime(&naive).earliest().unwrap().timestamp();
        assert_eq!(records[0].time, Some(expected));
    }

    #[test]
    fn test_regex_parser_offset_time_is_absolute() {
        let parser = RegexParser::new(
            r"^\[(?P<time>[^\]]+)\] (?P<msg>.*)$",
            Some("time".to_string()),
            Some("%Y-%m-%d %H:%M:%S %z".to_string()),
        )
        .unwrap();
        let records = parser.parse("[2024-01-01 02:00:10 +0200] boot").unwrap();
        assert_eq!(records[0].time, Some(1_704_067_210));
    }

    #[test]
    fn test_naive_record_time_matches_time_range_parsing() {
        let parser = RegexParser::new(
            r"^(?P<time>\S+ \S+) (?P<msg>.*)$",
            Some("time".to_string()),
            Some("%Y-%m-%d %H:%M:%S".to_string()),
        )
        .unwrap();
        let records = parser.parse("2024-05-01 12:30:00 ready").unwrap();

        let range =
            crate::config::TimeRange::parse(Some("2024-05-01 12:30:00"), None, "%Y-%m-%d %H:%M:%S")
                .unwrap();
        assert_eq!(records[0].time.map(|t| t * 1000), range.start_millis());
    }

    #[test]
    fn test_regex_parser_bad_time_is_error() {
        let parser = RegexParser::new(
            r"^(?P<ts>\S+) (?P<msg>.*)$",
            Some("ts".to_string()),
            None,
        )
        .unwrap();
        let err = parser.parse("noon hello").unwrap_err();
        assert!(matches!(err, ParseError::Time { .. }));
    }

    #[test]
    fn test_unmatched_optional_group_is_skipped() {
        let parser = RegexParser::new(r"^(?P<a>x)?(?P<b>y)$", None, None).unwrap();
        let records = parser.parse("y").unwrap();
        assert!(!records[0].body.contains_key("a"));
        assert_eq!(records[0].body["b"], "y");
    }

    #[test]
    fn test_from_config() {
        let parser = from_config(&ParseConfig::Raw {
            message_key: "message".to_string(),
        })
        .unwrap();
        assert_eq!(parser.parse("x").unwrap()[0].body["message"], "x");

        let invalid = from_config(&ParseConfig::Regex {
            expression: "(".to_string(),
            time_key: None,
            time_format: None,
        });
        assert!(invalid.is_err());
    }
}
