mod aggregate;
mod parser;
mod paths;
mod pipeline;
mod reader;
mod scan;
mod types;

pub use aggregate::{DedupAggregator, LogSummary, summarize_logs};
pub use parser::{hash_line, parse_usage_line};
pub use paths::default_log_roots;
pub use pipeline::ingest_logs;
pub use reader::{FileRead, ReadMode, classify, file_id, read_new};
pub use scan::{LogFile, ScanOutcome, scan_log_files};
pub use types::{IngestError, IngestIssue, IngestStats, IssueKind, Result};
