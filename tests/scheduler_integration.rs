//! Integration tests for the poll cycle
//!
//! Drive the scheduler end to end against the in-process fake log service,
//! with real cursor stores and a channel emitter.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use cwlogs_tail::cursor::{CursorKey, CursorStore, FileCursorStore, MemoryCursorStore};
use cwlogs_tail::emitter::Emission;
use cwlogs_tail::logs::{EventsPage, FakeLogsApi, LogEvent, LogsApiError};
use cwlogs_tail::Scheduler;

#[tokio::test]
async fn test_first_fetch_omits_token_then_resumes_from_cursor() {
    let api = Arc::new(FakeLogsApi::new());
    api.push_events(
        Some("app"),
        Ok(EventsPage::new(vec![LogEvent::new(1_000, "{}")], Some("T1"))),
    );

    let (scheduler, _rx) = common::scheduler(
        &common::input(Some("app")),
        api.clone(),
        Arc::new(MemoryCursorStore::new()),
    );

    scheduler.poll_cycle().await;
    scheduler.poll_cycle().await;

    let requests = api.event_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].next_token, None);
    assert_eq!(requests[1].next_token.as_deref(), Some("T1"));
    assert_eq!(requests[0].log_group_name, "/it/group");
}

#[tokio::test]
async fn test_repeated_token_is_written_once() {
    let api = Arc::new(FakeLogsApi::new());
    api.push_events(Some("app"), Ok(EventsPage::new(vec![], Some("T1"))));
    api.push_events(Some("app"), Ok(EventsPage::new(vec![], Some("T1"))));

    let cursors = Arc::new(MemoryCursorStore::new());
    let (scheduler, _rx) = common::scheduler(&common::input(Some("app")), api, cursors.clone());

    scheduler.poll_cycle().await;
    scheduler.poll_cycle().await;

    assert_eq!(cursors.write_count(), 1);
    assert_eq!(
        cursors
            .get(&CursorKey::Stream("app".to_string()))
            .unwrap()
            .as_deref(),
        Some("T1")
    );
}

#[tokio::test]
async fn test_end_before_start_fails_without_network_calls() {
    let mut input = common::input(Some("app"));
    input.start_time = Some("2024-06-02 00:00:00".to_string());
    input.end_time = Some("2024-06-01 23:59:59".to_string());

    let api = Arc::new(FakeLogsApi::new());
    let (emitter, _rx) = cwlogs_tail::emitter::ChannelEmitter::new();
    let result = Scheduler::new(
        &input,
        api.clone(),
        Arc::new(MemoryCursorStore::new()),
        Arc::new(emitter),
    );

    assert!(result.is_err());
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn test_time_range_is_sent_with_every_fetch() {
    let mut input = common::input(Some("app"));
    input.start_time = Some("2024-06-01 00:00:00 +0000".to_string());
    input.end_time = Some("2024-06-01 01:00:00 +0000".to_string());
    input.time_range_format = "%Y-%m-%d %H:%M:%S %z".to_string();

    let api = Arc::new(FakeLogsApi::new());
    let (scheduler, _rx) =
        common::scheduler(&input, api.clone(), Arc::new(MemoryCursorStore::new()));

    scheduler.poll_cycle().await;

    let request = &api.event_requests()[0];
    assert_eq!(request.start_time, Some(1_717_200_000_000));
    assert_eq!(request.end_time, Some(1_717_203_600_000));
}

#[tokio::test]
async fn test_json_records_and_decode_errors_in_stream_order() {
    let raw_bad = "{\"unterminated\": \u{00fc}";
    let api = Arc::new(FakeLogsApi::new());
    api.push_events(
        Some("app"),
        Ok(EventsPage::new(
            vec![
                LogEvent::new(1_717_200_000_999, r#"{"level":"info"}"#),
                LogEvent::new(1_717_200_001_000, raw_bad),
                LogEvent::new(1_717_200_002_500, r#"{"level":"warn"}"#),
            ],
            Some("T1"),
        )),
    );

    let (scheduler, mut rx) = common::scheduler(
        &common::input(Some("app")),
        api,
        Arc::new(MemoryCursorStore::new()),
    );

    let report = scheduler.poll_cycle().await;
    assert_eq!(report.events, 3);
    assert_eq!(report.records, 2);
    assert_eq!(report.decode_errors, 1);

    let emitted = common::drain(&mut rx);
    assert_eq!(emitted.len(), 3);

    match &emitted[0] {
        Emission::Record { tag, time, record } => {
            assert_eq!(tag, "it.logs");
            assert_eq!(*time, 1_717_200_000);
            assert_eq!(record["level"], "info");
        }
        other => panic!("unexpected emission: {:?}", other),
    }

    match &emitted[1] {
        Emission::Error {
            time,
            record,
            cause,
            ..
        } => {
            assert_eq!(*time, 1_717_200_001);
            assert_eq!(record["message"].as_str(), Some(raw_bad));
            assert!(!cause.is_empty());
        }
        other => panic!("unexpected emission: {:?}", other),
    }

    assert!(matches!(&emitted[2], Emission::Record { time: 1_717_200_002, .. }));
}

#[tokio::test]
async fn test_not_found_cycle_is_skipped_and_loop_recovers() {
    let mut input = common::input(Some("web"));
    input.use_log_stream_name_prefix = true;

    let api = Arc::new(FakeLogsApi::new());
    api.set_listing_error(Some(LogsApiError::ResourceNotFound(
        "log group /it/group".to_string(),
    )));

    let (scheduler, mut rx) =
        common::scheduler(&input, api.clone(), Arc::new(MemoryCursorStore::new()));

    let report = scheduler.poll_cycle().await;
    assert!(report.not_found);
    assert!(common::drain(&mut rx).is_empty());

    api.set_listing_error(None);
    api.set_streams(Some("web"), vec![vec!["web-1"]]);
    api.push_events(
        Some("web-1"),
        Ok(EventsPage::new(vec![LogEvent::new(5_000, "{}")], Some("W1"))),
    );

    let report = scheduler.poll_cycle().await;
    assert!(!report.not_found);
    assert_eq!(report.records, 1);
    assert_eq!(common::drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn test_date_prefixed_follows_the_calendar_without_restart() {
    let mut input = common::input(None);
    input.use_todays_log_stream = true;

    let api = Arc::new(FakeLogsApi::new());
    api.set_streams(Some("2024/05/31"), vec![vec!["2024/05/31/a"]]);
    api.set_streams(Some("2024/06/01"), vec![vec!["2024/06/01/a"]]);
    api.set_streams(Some("2024/06/02"), vec![vec!["2024/06/02/a"]]);

    let clock = Arc::new(common::ManualClock::new(common::date(2024, 6, 1)));
    let (scheduler, _rx) =
        common::scheduler(&input, api.clone(), Arc::new(MemoryCursorStore::new()));
    let scheduler = scheduler.with_clock(clock.clone());

    scheduler.poll_cycle().await;
    clock.set(common::date(2024, 6, 2));
    scheduler.poll_cycle().await;

    let prefixes: Vec<_> = api
        .describe_requests()
        .into_iter()
        .map(|r| r.log_stream_name_prefix.unwrap_or_default())
        .collect();
    assert_eq!(
        prefixes,
        vec!["2024/06/01", "2024/05/31", "2024/06/02", "2024/06/01"]
    );

    let streams: Vec<_> = api
        .event_requests()
        .into_iter()
        .map(|r| r.log_stream_name.unwrap_or_default())
        .collect();
    assert_eq!(
        streams,
        vec!["2024/06/01/a", "2024/05/31/a", "2024/06/02/a", "2024/06/01/a"]
    );
}

#[tokio::test]
async fn test_file_cursors_survive_restart() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let state_path = dir.path().join("state").join("cloudwatch");

    let api = Arc::new(FakeLogsApi::new());
    api.push_events(
        Some("2024/06/01/app"),
        Ok(EventsPage::new(vec![LogEvent::new(1_000, "{}")], Some("T1\n"))),
    );

    {
        let cursors = Arc::new(FileCursorStore::new(&state_path).unwrap());
        let (scheduler, _rx) =
            common::scheduler(&common::input(Some("2024/06/01/app")), api.clone(), cursors);
        scheduler.poll_cycle().await;
    }

    assert!(dir
        .path()
        .join("state")
        .join("cloudwatch_2024-06-01-app")
        .exists());

    let cursors = Arc::new(FileCursorStore::new(&state_path).unwrap());
    let (scheduler, _rx) =
        common::scheduler(&common::input(Some("2024/06/01/app")), api.clone(), cursors);
    scheduler.poll_cycle().await;

    assert_eq!(api.event_requests()[1].next_token.as_deref(), Some("T1"));
}

#[tokio::test]
async fn test_run_loop_polls_on_interval_until_shutdown() {
    let mut input = common::input(Some("app"));
    input.fetch_interval_secs = 1;

    let api = Arc::new(FakeLogsApi::new());
    api.push_events(
        Some("app"),
        Ok(EventsPage::new(vec![LogEvent::new(1_000, r#"{"n":1}"#)], Some("T1"))),
    );
    api.push_events(
        Some("app"),
        Ok(EventsPage::new(vec![LogEvent::new(2_000, r#"{"n":2}"#)], Some("T2"))),
    );

    let (mut scheduler, mut rx) =
        common::scheduler(&input, api.clone(), Arc::new(MemoryCursorStore::new()));
    let shutdown = scheduler.shutdown_handle();
    let task = tokio::spawn(async move { scheduler.run().await });

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("first cycle timed out");
    assert!(matches!(first, Some(Emission::Record { time: 1, .. })));

    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("second cycle timed out");
    assert!(matches!(second, Some(Emission::Record { time: 2, .. })));

    shutdown.shutdown();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert_eq!(api.event_requests().len(), 2);
}

#[tokio::test]
async fn test_whole_group_does_not_re_emit_events_across_cycles() {
    let api = Arc::new(FakeLogsApi::new());
    api.append_group_events(vec![
        LogEvent::new(1_000, r#"{"n":1}"#),
        LogEvent::new(2_000, r#"{"n":2}"#),
    ]);

    let cursors = Arc::new(MemoryCursorStore::new());
    let (scheduler, mut rx) =
        common::scheduler(&common::input(None), api.clone(), cursors.clone());

    scheduler.poll_cycle().await;
    assert_eq!(common::drain(&mut rx).len(), 2);

    scheduler.poll_cycle().await;
    scheduler.poll_cycle().await;
    assert!(common::drain(&mut rx).is_empty());
    assert_eq!(cursors.write_count(), 1);

    api.append_group_events(vec![
        LogEvent::new(2_000, r#"{"n":3}"#),
        LogEvent::new(4_000, r#"{"n":4}"#),
    ]);

    let report = scheduler.poll_cycle().await;
    assert_eq!(report.records, 2);
    let emitted = common::drain(&mut rx);
    assert!(matches!(&emitted[0], Emission::Record { record, .. } if record["n"] == 3));
    assert!(matches!(&emitted[1], Emission::Record { record, .. } if record["n"] == 4));

    let requests = api.event_requests();
    assert!(requests.iter().all(|r| r.log_stream_name.is_none()));
    assert!(requests.iter().all(|r| r.next_token.is_none()));
    assert_eq!(requests[0].start_time, None);
    assert_eq!(requests[1].start_time, Some(2_000));
}

#[tokio::test]
async fn test_whole_group_progress_survives_restart() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let state_path = dir.path().join("cloudwatch");

    let api = Arc::new(FakeLogsApi::new());
    api.append_group_events(vec![LogEvent::new(1_000, "{}")]);

    {
        let cursors = Arc::new(FileCursorStore::new(&state_path).unwrap());
        let (scheduler, mut rx) = common::scheduler(&common::input(None), api.clone(), cursors);
        scheduler.poll_cycle().await;
        assert_eq!(common::drain(&mut rx).len(), 1);
    }

    let cursors = Arc::new(FileCursorStore::new(&state_path).unwrap());
    let (scheduler, mut rx) = common::scheduler(&common::input(None), api.clone(), cursors);
    scheduler.poll_cycle().await;

    assert!(common::drain(&mut rx).is_empty());
    assert_eq!(api.event_requests()[1].start_time, Some(1_000));
}
