mod analytics;
mod importer;
mod refresh;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracker_core::PricingTable;

use crate::config::AppConfig;
use crate::error::Result;

pub use analytics::AnalyticsService;
pub use importer::ImportService;
pub use refresh::{RefreshService, SnapshotCache};

/// The importer and the querier each own a connection, so a long query never
/// waits for the writer and the writer never waits for a query.
#[derive(Clone)]
pub struct AppServices {
    pub importer: ImportService,
    pub analytics: AnalyticsService,
    pub refresh: RefreshService,
}

impl AppServices {
    pub fn open(config: Arc<AppConfig>, pricing: Arc<PricingTable>) -> Result<Self> {
        let importer = ImportService::open(&config.db_path, pricing.clone())?;
        let analytics = AnalyticsService::open(&config.db_path)?;
        let refresh = RefreshService::new(config, importer.clone(), analytics.clone(), pricing);
        Ok(Self {
            importer,
            analytics,
            refresh,
        })
    }
}

/// A panic while holding one of these locks leaves no partial state behind
/// (open transactions roll back on drop), so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
