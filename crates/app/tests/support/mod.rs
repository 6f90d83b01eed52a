#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tempfile::TempDir;
use tracker_app::{AppConfig, AppState};

pub struct TestApp {
    pub dir: TempDir,
    pub root: PathBuf,
    pub config: AppConfig,
}

impl TestApp {
    pub fn open(&self) -> AppState {
        AppState::open(self.config.clone()).expect("open app state")
    }

    pub fn log(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

pub fn setup_app() -> TestApp {
    setup_app_with(|_| {})
}

pub fn setup_app_with(adjust: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path().join("projects");
    fs::create_dir_all(&root).expect("create log root");
    let mut config = AppConfig {
        db_path: dir.path().join("data").join("usage.sqlite"),
        log_roots: vec![root.clone()],
        retention_days: 395,
        refresh_timeout_secs: 30,
        pricing_path: None,
    };
    adjust(&mut config);
    TestApp { dir, root, config }
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

pub fn assistant_line(
    message_id: &str,
    request_id: &str,
    model: &str,
    input: u64,
    ts: DateTime<Utc>,
) -> String {
    format!(
        r#"{{"type":"assistant","timestamp":"{}","requestId":"{}","message":{{"id":"{}","model":"{}","usage":{{"input_tokens":{},"output_tokens":0}}}}}}"#,
        ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        request_id,
        message_id,
        model,
        input
    )
}

pub fn write_lines(path: &Path, lines: &[String]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(path, body).expect("write log");
}

/// Holds the store's write lock until dropped.
pub fn hold_write_lock(db_path: &Path) -> rusqlite::Connection {
    let conn = rusqlite::Connection::open(db_path).expect("open lock connection");
    conn.execute_batch("BEGIN IMMEDIATE").expect("take write lock");
    conn
}
