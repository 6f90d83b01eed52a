use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};
use tracker_core::{
    IdentifiedRecord, PricingTable, TokenCount, UsagePeriod, UsageSnapshot, UsageSummary,
};

use crate::reader::read_new;
use crate::scan::scan_log_files;
use crate::types::IngestIssue;

/// Folds records into running totals, dropping repeats of a composite key.
///
/// Records without ids carry a digest of their own line as key, so they only
/// ever collide with a byte-identical line.
#[derive(Debug, Default)]
pub struct DedupAggregator {
    seen: HashSet<String>,
    usage: TokenCount,
    cost_usd: f64,
    records: u64,
    duplicates: u64,
}

impl DedupAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the record was a duplicate and was not counted.
    pub fn push(&mut self, item: &IdentifiedRecord, cost_usd: f64) -> bool {
        if !self.seen.insert(item.id.key()) {
            self.duplicates += 1;
            return false;
        }
        self.usage += item.record.usage;
        self.cost_usd += cost_usd;
        self.records += 1;
        true
    }

    pub fn usage(&self) -> TokenCount {
        self.usage
    }

    pub fn cost_usd(&self) -> f64 {
        self.cost_usd
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn into_summary(self, period: UsagePeriod, start: DateTime<Utc>) -> UsageSummary {
        let mut summary = UsageSummary::empty(period, start);
        summary.usage = self.usage;
        summary.total_tokens = self.usage.total();
        summary.total_cost_usd = self.cost_usd;
        summary.record_count = self.records;
        summary
    }
}

/// Result of summarizing logs without the store.
#[derive(Debug, Clone, Serialize)]
pub struct LogSummary {
    pub snapshot: UsageSnapshot,
    pub files_read: usize,
    pub duplicates: u64,
    pub issues: Vec<IngestIssue>,
}

/// Builds a snapshot straight from the log files, re-reading each one in full.
pub fn summarize_logs<Tz: TimeZone>(
    roots: &[PathBuf],
    cutoff: Option<DateTime<Utc>>,
    pricing: &PricingTable,
    now: &DateTime<Tz>,
) -> LogSummary {
    let scan = scan_log_files(roots, cutoff);
    let mut issues = scan.issues;
    let reads = scan
        .files
        .par_iter()
        .map(|file| (file, read_new(&file.path, None)))
        .collect::<Vec<_>>();

    let today_start = UsagePeriod::Today.start_at(now);
    let month_start = UsagePeriod::Last30Days.start_at(now);
    let mut month = DedupAggregator::new();
    let mut today = UsageSummary::empty(UsagePeriod::Today, today_start);
    let mut by_model: BTreeMap<String, TokenCount> = BTreeMap::new();
    let mut files_read = 0;

    for (file, read) in reads {
        let read = match read {
            Ok(read) => read,
            Err(err) => {
                warn!(file = %file.file_id, error = %err, "failed to read log file");
                issues.push(IngestIssue {
                    file_path: file.file_id.clone(),
                    kind: err.issue_kind(),
                    message: err.to_string(),
                });
                continue;
            }
        };
        files_read += 1;
        for item in read.records {
            if item.record.timestamp < month_start {
                continue;
            }
            let cost = pricing.cost_for(&item.record.model, item.record.usage);
            if !month.push(&item, cost) {
                continue;
            }
            if item.record.timestamp >= today_start {
                today.add(item.record.usage, cost);
            }
            *by_model.entry(item.record.model).or_default() += item.record.usage;
        }
    }

    let duplicates = month.duplicates();
    debug!(files_read, duplicates, "summarized logs without store");
    LogSummary {
        snapshot: UsageSnapshot {
            today,
            last_30_days: month.into_summary(UsagePeriod::Last30Days, month_start),
            by_model,
            computed_at: now.with_timezone(&Utc),
        },
        files_read,
        duplicates,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::{CompositeId, UsageRecord};

    fn item(id: CompositeId, input: u64) -> IdentifiedRecord {
        IdentifiedRecord {
            record: UsageRecord {
                model: "claude-sonnet-4-5".to_string(),
                usage: TokenCount {
                    input_tokens: input,
                    ..TokenCount::ZERO
                },
                timestamp: Utc::now(),
            },
            id,
        }
    }

    #[test]
    fn repeated_ids_count_once() {
        let mut aggregator = DedupAggregator::new();
        assert!(aggregator.push(&item(CompositeId::new("m1", "r1"), 100), 1.0));
        assert!(!aggregator.push(&item(CompositeId::new("m1", "r1"), 100), 1.0));
        assert!(aggregator.push(&item(CompositeId::new("m2", "r2"), 50), 0.5));
        assert_eq!(aggregator.usage().input_tokens, 150);
        assert_eq!(aggregator.records(), 2);
        assert_eq!(aggregator.duplicates(), 1);
        assert!((aggregator.cost_usd() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn distinct_unlabeled_records_are_all_counted() {
        let mut aggregator = DedupAggregator::new();
        assert!(aggregator.push(&item(CompositeId::synthetic("aaa"), 1), 0.0));
        assert!(aggregator.push(&item(CompositeId::synthetic("bbb"), 1), 0.0));
        assert!(!aggregator.push(&item(CompositeId::synthetic("aaa"), 1), 0.0));
        assert_eq!(aggregator.records(), 2);
    }

    #[test]
    fn summary_carries_totals() {
        let mut aggregator = DedupAggregator::new();
        aggregator.push(&item(CompositeId::new("m", "r"), 10), 0.25);
        let start = Utc::now();
        let summary = aggregator.into_summary(UsagePeriod::Last30Days, start);
        assert_eq!(summary.total_tokens, 10);
        assert_eq!(summary.record_count, 1);
        assert_eq!(summary.start, start);
    }
}
