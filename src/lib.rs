//! cwlogs-tail - CloudWatch Logs tailing library
//!
//! This library polls an AWS CloudWatch Logs group on a fixed interval,
//! persists a continuation cursor per log stream so restarts resume where
//! they stopped, decodes each event and hands the records to an emitter.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `scheduler`: Poll loop, cycle orchestration and shutdown
//! - `resolver`: Selects the streams of a cycle (explicit, prefix, date-prefixed)
//! - `pager`: Continuation-token pagination for stream listings
//! - `fetcher`: Per-stream event retrieval and cursor updates
//! - `cursor`: Durable cursor stores (file, embedded database, memory)
//! - `decoder`: JSON and structured-parser decoding of event payloads
//! - `emitter`: Record sinks (JSON lines, channel)
//! - `logs`: Remote log service trait, AWS SDK client and in-process fake
//! - `config`: Configuration management and validation
//! - `logging`: Tracing subscriber setup
//! - `error`: Error types and result aliases
//! - `cli` / `commands`: Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use cwlogs_tail::{Config, Scheduler};
//! use cwlogs_tail::emitter::JsonLinesEmitter;
//! use cwlogs_tail::logs::CloudWatchLogsClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/cwlogs-tail.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let api = Arc::new(CloudWatchLogsClient::from_config(&config.aws).await);
//!     let cursors = cwlogs_tail::cursor::open(&config.input.state)?;
//!     let emitter = Arc::new(JsonLinesEmitter::stdio());
//!
//!     let mut scheduler = Scheduler::new(&config.input, api, cursors, emitter)?;
//!     scheduler.run().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod cursor;
pub mod decoder;
pub mod emitter;
pub mod error;
pub mod fetcher;
pub mod logging;
pub mod logs;
pub mod pager;
pub mod resolver;
pub mod scheduler;

// Re-export commonly used types
pub use config::Config;
pub use error::{CwTailError, Result};
pub use scheduler::{CycleReport, Scheduler, ShutdownHandle};
