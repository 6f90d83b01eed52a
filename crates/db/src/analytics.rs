use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::params;
use tracker_core::{PersistedUsageRecord, TokenCount, UsagePeriod, UsageSnapshot, UsageSummary};

use crate::Db;
use crate::error::Result;
use crate::helpers::{format_ts, row_to_persisted_record};

impl Db {
    /// Calls `f` for every record with `ts >= since`, oldest first.
    fn fold_records_since<F>(&self, since: &DateTime<Utc>, mut f: F) -> Result<()>
    where
        F: FnMut(PersistedUsageRecord),
    {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, ts, model, input_tokens, output_tokens,
                   cache_creation_tokens, cache_read_tokens, cost_usd
            FROM usage_record
            WHERE ts >= ?1
            ORDER BY ts ASC
            "#,
        )?;
        let rows = stmt.query_map(params![format_ts(since)], row_to_persisted_record)?;
        for row in rows {
            f(row?);
        }
        Ok(())
    }

    pub fn usage_records_since(&self, since: &DateTime<Utc>) -> Result<Vec<PersistedUsageRecord>> {
        let mut records = Vec::new();
        self.fold_records_since(since, |record| records.push(record))?;
        Ok(records)
    }

    pub fn summarize<Tz: TimeZone>(
        &self,
        period: UsagePeriod,
        now: &DateTime<Tz>,
    ) -> Result<UsageSummary> {
        let start = period.start_at(now);
        let mut summary = UsageSummary::empty(period, start);
        self.fold_records_since(&start, |record| summary.add(record.usage, record.cost_usd))?;
        Ok(summary)
    }

    pub fn breakdown_by_model<Tz: TimeZone>(
        &self,
        period: UsagePeriod,
        now: &DateTime<Tz>,
    ) -> Result<BTreeMap<String, TokenCount>> {
        let start = period.start_at(now);
        let mut breakdown: BTreeMap<String, TokenCount> = BTreeMap::new();
        self.fold_records_since(&start, |record| {
            *breakdown.entry(record.model).or_default() += record.usage;
        })?;
        Ok(breakdown)
    }

    /// Today, the last 30 days and the 30-day model breakdown from one read, so
    /// the three views agree with each other.
    pub fn snapshot<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<UsageSnapshot> {
        let today_start = UsagePeriod::Today.start_at(now);
        let month_start = UsagePeriod::Last30Days.start_at(now);
        let mut today = UsageSummary::empty(UsagePeriod::Today, today_start);
        let mut last_30_days = UsageSummary::empty(UsagePeriod::Last30Days, month_start);
        let mut by_model: BTreeMap<String, TokenCount> = BTreeMap::new();
        let since = today_start.min(month_start);
        self.fold_records_since(&since, |record| {
            if record.timestamp >= today_start {
                today.add(record.usage, record.cost_usd);
            }
            if record.timestamp >= month_start {
                last_30_days.add(record.usage, record.cost_usd);
                *by_model.entry(record.model).or_default() += record.usage;
            }
        })?;
        Ok(UsageSnapshot {
            today,
            last_30_days,
            by_model,
            computed_at: now.with_timezone(&Utc),
        })
    }
}
