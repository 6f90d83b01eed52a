use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use tracker_core::PricingTable;
use tracker_db::Db;

use crate::reader::{FileRead, ReadMode, read_new};
use crate::scan::scan_log_files;
use crate::types::{IngestError, IngestStats, Result};

/// Imports the records and only then advances the file state, so a failure
/// in between leads to a harmless re-import.
fn persist_read(
    db: &mut Db,
    read: FileRead,
    horizon: DateTime<Utc>,
    pricing: &PricingTable,
) -> Result<usize> {
    if read.mode == ReadMode::Truncated {
        db.reset_file_state(&read.file_id)?;
    }
    let records = read
        .records
        .into_iter()
        .filter(|item| item.record.timestamp >= horizon)
        .collect::<Vec<_>>();
    let inserted = if records.is_empty() {
        0
    } else {
        db.import_usage_records(&records, pricing)?
    };
    db.upsert_file_state(&read.state)?;
    Ok(inserted)
}

/// One incremental pass over `roots`: reads new bytes from every changed file
/// and imports them. Per-file failures are collected as issues and do not stop
/// the pass; `should_stop` is polled between files.
pub fn ingest_logs<F>(
    db: &mut Db,
    roots: &[PathBuf],
    horizon: DateTime<Utc>,
    pricing: &PricingTable,
    should_stop: F,
) -> Result<IngestStats>
where
    F: Fn() -> bool + Sync,
{
    let started = Instant::now();
    let mut stats = IngestStats::default();
    let scan = scan_log_files(roots, Some(horizon));
    stats.files_scanned = scan.files.len();
    stats.issues.extend(scan.issues);
    let states = db.list_file_states()?;

    let reads = scan
        .files
        .par_iter()
        .map(|file| {
            if should_stop() {
                return None;
            }
            Some((file, read_new(&file.path, states.get(&file.file_id))))
        })
        .collect::<Vec<_>>();

    for entry in reads {
        if should_stop() {
            stats.cancelled = true;
            break;
        }
        let Some((file, read)) = entry else {
            stats.cancelled = true;
            break;
        };
        let read = match read {
            Ok(read) if read.mode == ReadMode::Unchanged => {
                stats.files_unchanged += 1;
                continue;
            }
            Ok(read) => read,
            Err(err) => {
                stats.files_changed += 1;
                stats.files_failed += 1;
                warn!(file = %file.file_id, error = %err, "skipping log file");
                stats.record_issue(&file.file_id, err.issue_kind(), err.to_string());
                continue;
            }
        };
        stats.files_changed += 1;
        stats.bytes_read += read.bytes_read;
        let records_read = read.records.len();
        match persist_read(db, read, horizon, pricing) {
            Ok(inserted) => {
                stats.records_read += records_read;
                stats.records_inserted += inserted;
                debug!(file = %file.file_id, records_read, inserted, "imported log file");
            }
            Err(err) => {
                stats.files_failed += 1;
                let busy = matches!(&err, IngestError::Db(db_err) if db_err.is_busy());
                warn!(
                    file = %file.file_id,
                    error = %err,
                    busy,
                    "import failed, state not advanced"
                );
                stats.record_issue(&file.file_id, err.issue_kind(), err.to_string());
            }
        }
    }

    info!(
        files_scanned = stats.files_scanned,
        files_changed = stats.files_changed,
        files_failed = stats.files_failed,
        records_read = stats.records_read,
        records_inserted = stats.records_inserted,
        cancelled = stats.cancelled,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ingest pass finished"
    );
    Ok(stats)
}
