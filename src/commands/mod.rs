/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `run`    - Poll the configured log group
- `check`  - Validate configuration and print the effective settings
- `inspect` - Show a stored cursor
*/

use crate::config::{Config, ParseConfig, StateBackend};
use crate::cursor::{CursorKey, CursorStore, MemoryCursorStore};
use crate::error::Result;
use std::sync::Arc;

// Tailer command handler
pub mod r#run {
    //! Run the tailer against CloudWatch Logs.
    //!
    //! Builds the SDK client, cursor store and STDOUT emitter, then either
    //! runs one poll cycle or loops until Ctrl-C.

    use super::*;
    use crate::emitter::JsonLinesEmitter;
    use crate::logs::CloudWatchLogsClient;
    use crate::scheduler::Scheduler;

    /// Start the tailer
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `once` - Run one poll cycle and return
    /// * `dry_run` - Keep cursors in memory instead of the configured store
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the cursor store
    /// cannot be opened. Runtime fetch and decode faults are logged, not
    /// returned.
    pub async fn run_tail(config: Config, once: bool, dry_run: bool) -> Result<()> {
        config.validate()?;

        let cursors: Arc<dyn CursorStore> = if dry_run {
            tracing::warn!("Dry run: cursors are kept in memory only");
            Arc::new(MemoryCursorStore::new())
        } else {
            crate::cursor::open(&config.input.state)?
        };

        let api = Arc::new(CloudWatchLogsClient::from_config(&config.aws).await);
        let emitter = Arc::new(JsonLinesEmitter::stdio());
        let mut scheduler = Scheduler::new(&config.input, api, cursors, emitter)?;

        if once {
            let report = scheduler.poll_cycle().await;
            tracing::info!(
                streams = report.streams,
                events = report.events,
                records = report.records,
                decode_errors = report.decode_errors,
                failed_streams = report.failed_streams,
                "Single poll cycle finished"
            );
            return Ok(());
        }

        let shutdown = scheduler.shutdown_handle();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested, finishing current cycle");
                shutdown.shutdown();
            }
        });

        scheduler.run().await;
        Ok(())
    }
}

// Configuration check handler
pub mod check {
    //! Validate the configuration without contacting AWS.

    use super::*;

    /// Validate `config` and print a summary of the effective settings.
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Config` describing the first invalid setting.
    pub fn run_check(config: &Config) -> Result<()> {
        config.validate()?;

        for line in summary(config)? {
            println!("{}", line);
        }
        Ok(())
    }

    /// Human-readable lines describing the effective settings.
    pub fn summary(config: &Config) -> Result<Vec<String>> {
        let input = &config.input;
        let range = input.time_range()?;

        let decoder = match &input.parse {
            Some(ParseConfig::Raw { message_key }) => format!("raw (key '{}')", message_key),
            Some(ParseConfig::Regex { expression, .. }) => format!("regex '{}'", expression),
            None => format!("json ({:?})", input.json_handler).to_lowercase(),
        };

        let backend = match input.state.backend {
            StateBackend::File => "file",
            StateBackend::Embedded => "embedded",
        };

        Ok(vec![
            "Configuration OK".to_string(),
            format!("  tag:            {}", input.tag),
            format!("  log group:      {}", input.log_group_name),
            format!("  selection:      {}", input.stream_selection()),
            format!("  interval:       {}s", input.fetch_interval_secs),
            format!(
                "  time range:     {} .. {}",
                fmt_bound(range.start_millis()),
                fmt_bound(range.end_millis())
            ),
            format!("  decoder:        {}", decoder),
            format!(
                "  state:          {} ({})",
                input.state.path.display(),
                backend
            ),
        ])
    }

    fn fmt_bound(millis: Option<i64>) -> String {
        millis.map_or_else(|| "-".to_string(), |m| m.to_string())
    }
}

// Cursor inspection handler
pub mod inspect {
    //! Print stored cursors.

    use super::*;

    /// Print the cursor stored for `stream` (or the whole-group cursor).
    ///
    /// # Errors
    ///
    /// Returns `CwTailError::Storage` if the store cannot be opened or read.
    pub fn show_cursor(config: &Config, stream: Option<String>) -> Result<()> {
        let store = crate::cursor::open(&config.input.state)?;
        let key = CursorKey::for_stream(stream.as_deref());

        match store.get(&key)? {
            Some(token) => println!("{}\t{}", key, token),
            None => println!("{}\t(no cursor stored)", key),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeRange;

    fn config() -> Config {
        let mut config = Config::default();
        config.input.log_group_name = "/aws/ecs/web".to_string();
        config
    }

    #[test]
    fn test_check_summary_lines() {
        let lines = check::summary(&config()).unwrap();
        assert_eq!(lines[0], "Configuration OK");
        assert!(lines.iter().any(|l| l.contains("/aws/ecs/web")));
        assert!(lines.iter().any(|l| l.contains("whole log group")));
        assert!(lines.iter().any(|l| l.contains("json (strict)")));
    }

    #[test]
    fn test_check_rejects_invalid_config() {
        assert!(check::run_check(&Config::default()).is_err());
    }

    #[test]
    fn test_summary_shows_time_range() {
        let mut config = config();
        config.input.start_time = Some("2024-01-01 00:00:00 +0000".to_string());
        config.input.time_range_format = "%Y-%m-%d %H:%M:%S %z".to_string();
        let expected = TimeRange::new(Some(1_704_067_200_000), None).unwrap();

        let lines = check::summary(&config).unwrap();
        let range_line = lines.iter().find(|l| l.contains("time range")).unwrap();
        assert!(range_line.contains(&expected.start_millis().unwrap().to_string()));
        assert!(range_line.ends_with(".. -"));
    }

    #[test]
    fn test_show_cursor_reads_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = config();
        config.input.state.path = dir.path().join("state");

        let store = crate::cursor::open(&config.input.state).unwrap();
        store
            .put(&CursorKey::Stream("app".to_string()), "T1")
            .unwrap();

        assert!(inspect::show_cursor(&config, Some("app".to_string())).is_ok());
        assert!(inspect::show_cursor(&config, None).is_ok());
    }
}
