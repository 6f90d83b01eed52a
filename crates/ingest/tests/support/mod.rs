#![allow(dead_code)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use tempfile::TempDir;
use tracker_db::Db;

pub struct LogDir {
    pub dir: TempDir,
    pub root: PathBuf,
}

impl LogDir {
    pub fn roots(&self) -> Vec<PathBuf> {
        vec![self.root.clone()]
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

pub fn setup_logs() -> LogDir {
    let dir = tempfile::tempdir().expect("temp dir");
    let root = dir.path().join("projects");
    fs::create_dir_all(&root).expect("create log root");
    LogDir { dir, root }
}

pub fn setup_db(logs: &LogDir) -> Db {
    let mut db = Db::open(logs.dir.path().join("usage.sqlite")).expect("open db");
    db.migrate().expect("migrate db");
    db
}

pub fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn minutes_ago(minutes: i64) -> DateTime<Utc> {
    Utc::now() - Duration::minutes(minutes)
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

pub fn assistant_line(
    message_id: &str,
    request_id: &str,
    model: &str,
    input: u64,
    ts: DateTime<Utc>,
) -> String {
    format!(
        r#"{{"type":"assistant","timestamp":"{}","requestId":"{}","message":{{"id":"{}","model":"{}","role":"assistant","usage":{{"input_tokens":{},"output_tokens":10,"cache_creation_input_tokens":0,"cache_read_input_tokens":0}}}}}}"#,
        iso(ts),
        request_id,
        message_id,
        model,
        input
    )
}

pub fn user_line(ts: DateTime<Utc>) -> String {
    format!(
        r#"{{"type":"user","timestamp":"{}","message":{{"role":"user","content":"hello"}}}}"#,
        iso(ts)
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

pub fn append_lines(path: &Path, lines: &[String]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("open log");
    for line in lines {
        writeln!(file, "{}", line).expect("append log");
    }
}
