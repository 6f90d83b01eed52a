use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;
use walkdir::WalkDir;

use crate::reader::{file_id, mtime_of};
use crate::types::{IngestIssue, IssueKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub file_id: String,
    pub size: u64,
    pub mtime: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub files: Vec<LogFile>,
    pub issues: Vec<IngestIssue>,
}

fn is_log_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|value| value.to_str()),
        Some("jsonl")
    )
}

/// Lists `.jsonl` files under `roots`, skipping files last modified before
/// `cutoff`. Missing roots and unreadable entries never fail the scan.
pub fn scan_log_files(roots: &[PathBuf], cutoff: Option<DateTime<Utc>>) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut found = BTreeMap::new();
    for root in roots {
        if !root.is_dir() {
            debug!(root = %root.display(), "log root missing, skipping");
            continue;
        }
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let file_path = err
                        .path()
                        .map(|path| path.to_string_lossy().to_string())
                        .unwrap_or_else(|| "<unknown>".to_string());
                    outcome.issues.push(IngestIssue {
                        file_path,
                        kind: IssueKind::FileAccess,
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !is_log_path(path) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    outcome.issues.push(IngestIssue {
                        file_path: file_id(path),
                        kind: IssueKind::FileAccess,
                        message: err.to_string(),
                    });
                    continue;
                }
            };
            let mtime = mtime_of(&metadata);
            if let (Some(cutoff), Some(mtime)) = (cutoff, mtime)
                && mtime < cutoff
            {
                continue;
            }
            let file_id = file_id(path);
            found.entry(file_id.clone()).or_insert_with(|| LogFile {
                path: path.to_path_buf(),
                file_id,
                size: metadata.len(),
                mtime,
            });
        }
    }
    outcome.files = found.into_values().collect();
    debug!(
        files = outcome.files.len(),
        issues = outcome.issues.len(),
        "scanned log roots"
    );
    outcome
}
