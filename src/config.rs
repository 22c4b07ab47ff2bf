//! Configuration management for cwlogs-tail
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{CwTailError, Result};
use crate::resolver::StreamSelection;

/// Main configuration structure for cwlogs-tail
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// CloudWatch input settings
    pub input: InputConfig,

    /// AWS client settings
    #[serde(default)]
    pub aws: AwsConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings of one CloudWatch Logs input instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Tag attached to every emitted record
    pub tag: String,

    /// Log group to read from
    pub log_group_name: String,

    /// Stream to read, or the stream name prefix in prefix mode.
    /// When unset outside prefix mode the whole group is read.
    #[serde(default)]
    pub log_stream_name: Option<String>,

    /// Treat `log_stream_name` as a prefix and read every matching stream
    #[serde(default)]
    pub use_log_stream_name_prefix: bool,

    /// Read the streams prefixed with today's and yesterday's date
    #[serde(default)]
    pub use_todays_log_stream: bool,

    /// `strftime` format of the date prefix used by `use_todays_log_stream`
    #[serde(default = "default_todays_log_stream_format")]
    pub todays_log_stream_format: String,

    /// Seconds between the starts of two poll cycles
    #[serde(default = "default_fetch_interval_secs")]
    pub fetch_interval_secs: u64,

    /// Idle sleep quantum in milliseconds; shutdown is noticed at this granularity
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,

    /// Lower time bound, formatted with `time_range_format`
    #[serde(default)]
    pub start_time: Option<String>,

    /// Upper time bound, formatted with `time_range_format`
    #[serde(default)]
    pub end_time: Option<String>,

    /// `strftime` format of `start_time` and `end_time`
    #[serde(default = "default_time_range_format")]
    pub time_range_format: String,

    /// Use the CloudWatch event timestamp for parser-produced records
    #[serde(default)]
    pub use_aws_timestamp: bool,

    /// Read a stream from its oldest event when no cursor is stored
    #[serde(default = "default_start_from_head")]
    pub start_from_head: bool,

    /// JSON decoder used when no `parse` section is configured
    #[serde(default)]
    pub json_handler: JsonHandlerKind,

    /// Optional cap on stream listing pages per prefix
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Structured parser for non-JSON payloads
    #[serde(default)]
    pub parse: Option<ParseConfig>,

    /// Cursor persistence
    #[serde(default)]
    pub state: StateConfig,
}

fn default_todays_log_stream_format() -> String {
    "%Y/%m/%d".to_string()
}

fn default_fetch_interval_secs() -> u64 {
    60
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_time_range_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_start_from_head() -> bool {
    true
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            tag: "cloudwatch.logs".to_string(),
            log_group_name: String::new(),
            log_stream_name: None,
            use_log_stream_name_prefix: false,
            use_todays_log_stream: false,
            todays_log_stream_format: default_todays_log_stream_format(),
            fetch_interval_secs: default_fetch_interval_secs(),
            tick_millis: default_tick_millis(),
            start_time: None,
            end_time: None,
            time_range_format: default_time_range_format(),
            use_aws_timestamp: false,
            start_from_head: default_start_from_head(),
            json_handler: JsonHandlerKind::default(),
            max_pages: None,
            parse: None,
            state: StateConfig::default(),
        }
    }
}

/// JSON decoder selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JsonHandlerKind {
    /// Standard JSON via `serde_json`
    #[default]
    Strict,
    /// JSON superset via `serde_yaml` (comments, unquoted keys)
    Relaxed,
}

/// Structured parser selection for non-JSON payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParseConfig {
    /// Keep the whole payload under a single key
    #[serde(rename = "none")]
    Raw {
        /// Field name of the payload
        #[serde(default = "default_message_key")]
        message_key: String,
    },

    /// Named capture groups of a regular expression become fields
    Regex {
        /// Expression with named capture groups
        expression: String,

        /// Capture holding the record time
        #[serde(default)]
        time_key: Option<String>,

        /// `strftime` format of the time capture; epoch seconds when unset
        #[serde(default)]
        time_format: Option<String>,
    },
}

fn default_message_key() -> String {
    "message".to_string()
}

/// Cursor store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StateBackend {
    /// One file per stream next to `path`
    #[default]
    File,
    /// Embedded key-value database at `path`
    Embedded,
}

/// Cursor persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateConfig {
    /// Backend kind
    #[serde(default)]
    pub backend: StateBackend,

    /// State file (file backend) or database directory (embedded backend)
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

fn default_state_path() -> PathBuf {
    PathBuf::from("state/cloudwatch")
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            path: default_state_path(),
        }
    }
}

/// AWS client configuration
///
/// Unset values fall back to the SDK default provider chain.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AwsConfig {
    /// AWS region
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint URL (e.g. a local emulator)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Static access key id
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Static secret access key
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON-formatted logs
    #[serde(default)]
    pub json_format: bool,

    /// Log file path (if None, STDERR only)
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

/// Optional time bounds of event retrieval, in epoch milliseconds.
///
/// When both bounds are present, `end_millis >= start_millis` holds; the
/// constructors reject anything else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    start_millis: Option<i64>,
    end_millis: Option<i64>,
}

impl TimeRange {
    /// Build a range from millisecond bounds.
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Config` if both bounds are set and the end lies
    /// before the start.
    ///
    /// # Examples
    ///
    /// ```
    /// use cwlogs_tail::config::TimeRange;
    ///
    /// assert!(TimeRange::new(Some(1_000), Some(2_000)).is_ok());
    /// assert!(TimeRange::new(Some(2_000), None).is_ok());
    /// assert!(TimeRange::new(Some(2_000), Some(1_000)).is_err());
    /// ```
    pub fn new(start_millis: Option<i64>, end_millis: Option<i64>) -> Result<Self> {
        if let (Some(start), Some(end)) = (start_millis, end_millis) {
            if end < start {
                return Err(CwTailError::Config(format!(
                    "end_time({}) should be greater than start_time({})",
                    end, start
                ))
                .into());
            }
        }

        Ok(Self {
            start_millis,
            end_millis,
        })
    }

    /// Parse string bounds with a `strftime` format.
    ///
    /// Formats carrying a UTC offset (`%z`) are honoured; otherwise the value
    /// is read as local time. A date-only format means midnight.
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Config` on unparsable bounds or end before start.
    pub fn parse(start: Option<&str>, end: Option<&str>, format: &str) -> Result<Self> {
        let start_millis = start
            .map(|s| parse_time_millis("start_time", s, format))
            .transpose()?;
        let end_millis = end
            .map(|s| parse_time_millis("end_time", s, format))
            .transpose()?;
        Self::new(start_millis, end_millis)
    }

    /// Lower bound in epoch milliseconds
    pub fn start_millis(&self) -> Option<i64> {
        self.start_millis
    }

    /// Upper bound in epoch milliseconds
    pub fn end_millis(&self) -> Option<i64> {
        self.end_millis
    }
}

fn parse_time_millis(field: &str, value: &str, format: &str) -> Result<i64> {
    if let Ok(with_offset) = DateTime::parse_from_str(value, format) {
        return Ok(with_offset.timestamp_millis());
    }

    let naive = NaiveDateTime::parse_from_str(value, format)
        .or_else(|_| {
            NaiveDate::parse_from_str(value, format).map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|e| {
            CwTailError::Config(format!(
                "Invalid {} '{}' for format '{}': {}",
                field, value, format, e
            ))
        })?;

    let local = Local.from_local_datetime(&naive).earliest().ok_or_else(|| {
        CwTailError::Config(format!("{} '{}' does not exist in local time", field, value))
    })?;

    Ok(local.timestamp_millis())
}

impl InputConfig {
    /// Parsed time bounds of this input.
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Config` on unparsable bounds or end before start.
    pub fn time_range(&self) -> Result<TimeRange> {
        TimeRange::parse(
            self.start_time.as_deref(),
            self.end_time.as_deref(),
            &self.time_range_format,
        )
    }

    /// Stream selection mode derived from the flags.
    ///
    /// `use_todays_log_stream` takes precedence over
    /// `use_log_stream_name_prefix`.
    pub fn stream_selection(&self) -> StreamSelection {
        if self.use_todays_log_stream {
            StreamSelection::DatePrefixed {
                format: self.todays_log_stream_format.clone(),
            }
        } else if self.use_log_stream_name_prefix {
            StreamSelection::Prefix(self.log_stream_name.clone())
        } else {
            StreamSelection::Explicit(self.log_stream_name.clone())
        }
    }

    /// Validate this input section.
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Config` describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            return Err(CwTailError::Config("input.tag cannot be empty".to_string()).into());
        }

        if self.log_group_name.trim().is_empty() {
            return Err(
                CwTailError::Config("input.log_group_name cannot be empty".to_string()).into(),
            );
        }

        if self.fetch_interval_secs == 0 {
            return Err(CwTailError::Config(
                "input.fetch_interval_secs must be greater than 0".to_string(),
            )
            .into());
        }

        if self.tick_millis == 0 {
            return Err(
                CwTailError::Config("input.tick_millis must be greater than 0".to_string()).into(),
            );
        }

        if self.max_pages == Some(0) {
            return Err(CwTailError::Config(
                "input.max_pages must be greater than 0 when set".to_string(),
            )
            .into());
        }

        if self.use_todays_log_stream && self.todays_log_stream_format.trim().is_empty() {
            return Err(CwTailError::Config(
                "input.todays_log_stream_format cannot be empty".to_string(),
            )
            .into());
        }

        if let Some(ParseConfig::Regex {
            expression,
            time_key,
            time_format,
        }) = &self.parse
        {
            regex::Regex::new(expression).map_err(|e| {
                CwTailError::Config(format!("input.parse.expression is invalid: {}", e))
            })?;

            if time_format.is_some() && time_key.is_none() {
                return Err(CwTailError::Config(
                    "input.parse.time_format requires input.parse.time_key".to_string(),
                )
                .into());
            }
        }

        self.time_range()?;

        Ok(())
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration. A missing file yields the
    /// defaults, which only validate once the log group is supplied through
    /// the environment.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CwTailError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| CwTailError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(tag) = std::env::var("CWTAIL_TAG") {
            self.input.tag = tag;
        }

        if let Ok(group) = std::env::var("CWTAIL_LOG_GROUP") {
            tracing::debug!(log_group = %group, "Env override: CWTAIL_LOG_GROUP");
            self.input.log_group_name = group;
        }

        if let Ok(stream) = std::env::var("CWTAIL_LOG_STREAM") {
            tracing::debug!(log_stream = %stream, "Env override: CWTAIL_LOG_STREAM");
            self.input.log_stream_name = Some(stream).filter(|s| !s.is_empty());
        }

        if let Ok(interval) = std::env::var("CWTAIL_FETCH_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(v) => {
                    self.input.fetch_interval_secs = v;
                    tracing::debug!(
                        fetch_interval_secs = v,
                        "Env override: CWTAIL_FETCH_INTERVAL"
                    );
                }
                Err(_) => {
                    tracing::warn!("Invalid value for CWTAIL_FETCH_INTERVAL: {}", interval);
                }
            }
        }

        if let Ok(path) = std::env::var("CWTAIL_STATE_PATH") {
            tracing::debug!(state_path = %path, "Env override: CWTAIL_STATE_PATH");
            self.input.state.path = PathBuf::from(path);
        }

        if let Ok(region) = std::env::var("CWTAIL_AWS_REGION") {
            self.aws.region = Some(region);
        }

        if let Ok(endpoint) = std::env::var("CWTAIL_AWS_ENDPOINT") {
            self.aws.endpoint = Some(endpoint);
        }

        if let Ok(level) = std::env::var("CWTAIL_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("CWTAIL_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => {
                    self.logging.json_format = v;
                    tracing::debug!(json_logs = v, "Env override: CWTAIL_JSON_LOGS");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for CWTAIL_JSON_LOGS: {}", json_logs);
                }
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            self.logging.level = "debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// Runs before any remote client is built, so an invalid configuration
    /// never reaches the network.
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Config` if any validation check fails
    pub fn validate(&self) -> Result<()> {
        self.input.validate()?;

        if self.aws.access_key_id.is_some() != self.aws.secret_access_key.is_some() {
            return Err(CwTailError::Config(
                "aws.access_key_id and aws.secret_access_key must be set together".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
