use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

use cwlogs_tail::config::InputConfig;
use cwlogs_tail::cursor::CursorStore;
use cwlogs_tail::emitter::{ChannelEmitter, Emission};
use cwlogs_tail::logs::FakeLogsApi;
use cwlogs_tail::resolver::Clock;
use cwlogs_tail::Scheduler;

/// Clock whose date only changes when told to.
#[allow(dead_code)]
pub struct ManualClock {
    today: Mutex<NaiveDate>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today: Mutex::new(today),
        }
    }

    pub fn set(&self, today: NaiveDate) {
        *self.today.lock().unwrap() = today;
    }
}

impl Clock for ManualClock {
    fn today(&self) -> NaiveDate {
        *self.today.lock().unwrap()
    }
}

#[allow(dead_code)]
pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

#[allow(dead_code)]
pub fn input(stream: Option<&str>) -> InputConfig {
    InputConfig {
        tag: "it.logs".to_string(),
        log_group_name: "/it/group".to_string(),
        log_stream_name: stream.map(str::to_string),
        tick_millis: 5,
        ..Default::default()
    }
}

#[allow(dead_code)]
pub fn scheduler(
    input: &InputConfig,
    api: Arc<FakeLogsApi>,
    cursors: Arc<dyn CursorStore>,
) -> (Scheduler, UnboundedReceiver<Emission>) {
    let (emitter, rx) = ChannelEmitter::new();
    let scheduler = Scheduler::new(input, api, cursors, Arc::new(emitter))
        .expect("failed to build scheduler");
    (scheduler, rx)
}

#[allow(dead_code)]
pub fn drain(rx: &mut UnboundedReceiver<Emission>) -> Vec<Emission> {
    let mut out = Vec::new();
    while let Ok(emission) = rx.try_recv() {
        out.push(emission);
    }
    out
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
