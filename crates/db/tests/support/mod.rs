#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tracker_core::{CompositeId, IdentifiedRecord, TokenCount, UsageRecord};
use tracker_db::Db;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn tokens(input: u64, output: u64, write: u64, read: u64) -> TokenCount {
    TokenCount {
        input_tokens: input,
        output_tokens: output,
        cache_creation_tokens: write,
        cache_read_tokens: read,
    }
}

pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("timestamp")
        .with_timezone(&Utc)
}

pub fn make_record(
    primary: &str,
    secondary: &str,
    model: &str,
    usage: TokenCount,
    timestamp: DateTime<Utc>,
) -> IdentifiedRecord {
    IdentifiedRecord {
        record: UsageRecord {
            model: model.to_string(),
            usage,
            timestamp,
        },
        id: CompositeId::new(primary, secondary),
    }
}
