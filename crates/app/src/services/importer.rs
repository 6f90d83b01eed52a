use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use ingest::IngestStats;
use tracker_core::{IdentifiedRecord, PricingTable};
use tracker_db::{Db, SweepStats};

use crate::error::Result;
use crate::services::lock;

/// Sole writer to the store. Calls block and are serialized by the connection
/// lock.
#[derive(Clone)]
pub struct ImportService {
    db: Arc<Mutex<Db>>,
    pricing: Arc<PricingTable>,
}

impl ImportService {
    /// Opens the write connection and brings the schema up to date.
    pub fn open(db_path: &Path, pricing: Arc<PricingTable>) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut db = Db::open(db_path)?;
        db.migrate()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            pricing,
        })
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn ingest<F>(
        &self,
        roots: &[PathBuf],
        horizon: DateTime<Utc>,
        should_stop: F,
    ) -> Result<IngestStats>
    where
        F: Fn() -> bool + Sync,
    {
        let mut db = lock(&self.db);
        Ok(ingest::ingest_logs(
            &mut db,
            roots,
            horizon,
            &self.pricing,
            should_stop,
        )?)
    }

    pub fn import(&self, batch: &[IdentifiedRecord]) -> Result<usize> {
        let mut db = lock(&self.db);
        Ok(db.import_usage_records(batch, &self.pricing)?)
    }

    pub fn sweep(&self, horizon: DateTime<Utc>) -> Result<SweepStats> {
        let mut db = lock(&self.db);
        Ok(db.sweep_older_than(horizon)?)
    }

    pub fn backfill_costs(&self) -> Result<usize> {
        let mut db = lock(&self.db);
        Ok(db.backfill_costs(&self.pricing)?)
    }

    /// Forces the next refresh to read `file_id` from the start.
    pub fn reset_file(&self, file_id: &str) -> Result<()> {
        let db = lock(&self.db);
        Ok(db.reset_file_state(file_id)?)
    }

    pub fn count_records(&self) -> Result<u64> {
        let db = lock(&self.db);
        Ok(db.count_usage_records()?)
    }
}
