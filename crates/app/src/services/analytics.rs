use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, TimeZone};
use tracker_core::{TokenCount, UsagePeriod, UsageSnapshot, UsageSummary};
use tracker_db::Db;

use crate::error::Result;
use crate::services::lock;

/// Read side of the store on its own connection.
#[derive(Clone)]
pub struct AnalyticsService {
    db: Arc<Mutex<Db>>,
}

impl AnalyticsService {
    pub fn open(db_path: &Path) -> Result<Self> {
        let db = Db::open(db_path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    pub fn summarize(&self, period: UsagePeriod) -> Result<UsageSummary> {
        self.summarize_at(period, &Local::now())
    }

    pub fn summarize_at<Tz: TimeZone>(
        &self,
        period: UsagePeriod,
        now: &DateTime<Tz>,
    ) -> Result<UsageSummary> {
        let db = lock(&self.db);
        Ok(db.summarize(period, now)?)
    }

    pub fn breakdown_by_model(&self, period: UsagePeriod) -> Result<BTreeMap<String, TokenCount>> {
        let db = lock(&self.db);
        Ok(db.breakdown_by_model(period, &Local::now())?)
    }

    pub fn snapshot(&self) -> Result<UsageSnapshot> {
        self.snapshot_at(&Local::now())
    }

    pub fn snapshot_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<UsageSnapshot> {
        let db = lock(&self.db);
        Ok(db.snapshot(now)?)
    }
}
