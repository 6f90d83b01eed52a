use serde::Serialize;
use std::io;

/// Ingest summary returned after scanning log roots.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub files_scanned: usize,
    pub files_unchanged: usize,
    pub files_changed: usize,
    pub files_failed: usize,
    pub records_read: usize,
    pub records_inserted: usize,
    pub bytes_read: u64,
    pub cancelled: bool,
    pub issues: Vec<IngestIssue>,
}

impl IngestStats {
    /// Every changed file failed and nothing was read from any of them.
    pub fn is_total_failure(&self) -> bool {
        self.files_changed > 0
            && self.files_failed == self.files_changed
            && self.records_read == 0
    }

    pub(crate) fn record_issue(&mut self, file_path: &str, kind: IssueKind, message: String) {
        self.issues.push(IngestIssue {
            file_path: file_path.to_string(),
            kind,
            message,
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    FileAccess,
    Parse,
    Persistence,
}

/// Non-fatal issues encountered during ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestIssue {
    pub file_path: String,
    pub kind: IssueKind,
    pub message: String,
}

/// Errors emitted by the ingest pipeline.
#[derive(Debug)]
pub enum IngestError {
    Io(io::Error),
    Db(tracker_db::DbError),
    Parse { file_path: String, lines: u64 },
}

impl IngestError {
    pub fn issue_kind(&self) -> IssueKind {
        match self {
            Self::Io(_) => IssueKind::FileAccess,
            Self::Db(_) => IssueKind::Persistence,
            Self::Parse { .. } => IssueKind::Parse,
        }
    }
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io error: {}", err),
            Self::Db(err) => write!(f, "db error: {}", err),
            Self::Parse { file_path, lines } => write!(
                f,
                "none of {} new lines in {} is valid json",
                lines, file_path
            ),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Parse { .. } => None,
        }
    }
}

impl From<io::Error> for IngestError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<tracker_db::DbError> for IngestError {
    fn from(err: tracker_db::DbError) -> Self {
        Self::Db(err)
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
