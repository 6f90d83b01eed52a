use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use ingest::IngestStats;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracker_core::{PricingTable, UsageSnapshot};

use crate::config::AppConfig;
use crate::error::RefreshError;
use crate::services::{AnalyticsService, ImportService, lock};

type RefreshResult = Result<UsageSnapshot, RefreshError>;
type RefreshFuture = Shared<BoxFuture<'static, RefreshResult>>;

/// Last snapshot, valid for the local calendar day it was computed on.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    entry: Option<(NaiveDate, UsageSnapshot)>,
}

impl SnapshotCache {
    pub fn get(&self, today: NaiveDate) -> Option<UsageSnapshot> {
        match &self.entry {
            Some((day, snapshot)) if *day == today => Some(snapshot.clone()),
            _ => None,
        }
    }

    pub fn put(&mut self, day: NaiveDate, snapshot: UsageSnapshot) {
        self.entry = Some((day, snapshot));
    }

    /// Files `snapshot` under the local day it was computed on.
    pub fn store(&mut self, snapshot: UsageSnapshot) {
        let day = snapshot.computed_at.with_timezone(&Local).date_naive();
        self.put(day, snapshot);
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }
}

struct InFlight {
    generation: u64,
    future: RefreshFuture,
    cancel: CancellationToken,
}

struct RefreshInner {
    config: Arc<AppConfig>,
    importer: ImportService,
    analytics: AnalyticsService,
    pricing: Arc<PricingTable>,
    in_flight: Mutex<Option<InFlight>>,
    cache: Mutex<SnapshotCache>,
    last_stats: Mutex<Option<IngestStats>>,
    runs: AtomicU64,
}

/// Scan, import, sweep and query as one operation. Concurrent callers share a
/// single in-flight run.
#[derive(Clone)]
pub struct RefreshService {
    inner: Arc<RefreshInner>,
}

impl RefreshService {
    pub fn new(
        config: Arc<AppConfig>,
        importer: ImportService,
        analytics: AnalyticsService,
        pricing: Arc<PricingTable>,
    ) -> Self {
        Self {
            inner: Arc::new(RefreshInner {
                config,
                importer,
                analytics,
                pricing,
                in_flight: Mutex::new(None),
                cache: Mutex::new(SnapshotCache::default()),
                last_stats: Mutex::new(None),
                runs: AtomicU64::new(0),
            }),
        }
    }

    /// Runs a refresh, or joins the one already running. Must be called from
    /// within a tokio runtime.
    pub async fn refresh(&self) -> RefreshResult {
        let future = {
            let mut slot = lock(&self.inner.in_flight);
            match slot.as_ref() {
                Some(in_flight) => {
                    debug!(generation = in_flight.generation, "joining in-flight refresh");
                    in_flight.future.clone()
                }
                None => {
                    let generation = self.inner.runs.fetch_add(1, Ordering::SeqCst) + 1;
                    let cancel = CancellationToken::new();
                    let future = self.start(generation, cancel.clone());
                    *slot = Some(InFlight {
                        generation,
                        future: future.clone(),
                        cancel,
                    });
                    future
                }
            }
        };
        future.await
    }

    fn start(&self, generation: u64, cancel: CancellationToken) -> RefreshFuture {
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let result = inner.run(cancel).await;
            let mut slot = lock(&inner.in_flight);
            if slot
                .as_ref()
                .is_some_and(|in_flight| in_flight.generation == generation)
            {
                *slot = None;
            }
            result
        });
        async move {
            handle
                .await
                .unwrap_or_else(|err| Err(RefreshError::Join(err.to_string())))
        }
        .boxed()
        .shared()
    }

    /// Today's cached snapshot, refreshing first when there is none.
    pub async fn snapshot(&self) -> RefreshResult {
        if let Some(snapshot) = self.cached_snapshot() {
            return Ok(snapshot);
        }
        self.refresh().await
    }

    pub fn cached_snapshot(&self) -> Option<UsageSnapshot> {
        lock(&self.inner.cache).get(Local::now().date_naive())
    }

    pub fn invalidate(&self) {
        lock(&self.inner.cache).clear();
    }

    /// Stops the in-flight refresh after the file it is working on. Imports
    /// that already committed stay.
    pub fn cancel(&self) {
        if let Some(in_flight) = lock(&self.inner.in_flight).as_ref() {
            info!(generation = in_flight.generation, "cancelling refresh");
            in_flight.cancel.cancel();
        }
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.inner.in_flight).is_some()
    }

    pub fn last_stats(&self) -> Option<IngestStats> {
        lock(&self.inner.last_stats).clone()
    }

    /// Refresh runs started so far; joined callers do not count.
    pub fn run_count(&self) -> u64 {
        self.inner.runs.load(Ordering::SeqCst)
    }
}

impl RefreshInner {
    async fn run(&self, cancel: CancellationToken) -> RefreshResult {
        let started = Instant::now();
        let timeout = self.config.refresh_timeout();
        let stats = self.import(cancel.clone(), timeout).await?;
        *lock(&self.last_stats) = Some(stats.clone());

        if stats.is_total_failure() {
            warn!(
                files_failed = stats.files_failed,
                "refresh failed for every changed file"
            );
            return Err(RefreshError::TotalFailure {
                files: stats.files_failed,
                issues: stats.issues,
            });
        }
        if cancel.is_cancelled() {
            return Err(RefreshError::Cancelled);
        }

        let snapshot = self.query().await?;
        lock(&self.cache).store(snapshot.clone());
        info!(
            files_changed = stats.files_changed,
            files_failed = stats.files_failed,
            records_inserted = stats.records_inserted,
            today_tokens = snapshot.today.total_tokens,
            month_cost_usd = snapshot.last_30_days.total_cost_usd,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "refresh finished"
        );
        Ok(snapshot)
    }

    /// Ingest plus retention sweep on the blocking pool, bounded by `timeout`.
    async fn import(
        &self,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Result<IngestStats, RefreshError> {
        let importer = self.importer.clone();
        let roots = self.config.log_roots();
        let horizon = self.config.retention_horizon(Utc::now());
        let stop = cancel.clone();
        let work = tokio::task::spawn_blocking(move || -> crate::Result<IngestStats> {
            let stats = importer.ingest(&roots, horizon, || stop.is_cancelled())?;
            if !stats.cancelled {
                importer.sweep(horizon)?;
            }
            Ok(stats)
        });
        match tokio::time::timeout(timeout, work).await {
            Err(_) => {
                cancel.cancel();
                warn!(timeout_secs = timeout.as_secs(), "refresh timed out, stopping file work");
                Err(RefreshError::TimedOut {
                    after_secs: timeout.as_secs(),
                })
            }
            Ok(Err(err)) => Err(RefreshError::Join(err.to_string())),
            Ok(Ok(Err(err))) => Err(RefreshError::Store(err.to_string())),
            Ok(Ok(Ok(stats))) => Ok(stats),
        }
    }

    /// Snapshot from the store, or from the logs directly when the store
    /// cannot be queried.
    async fn query(&self) -> RefreshResult {
        let analytics = self.analytics.clone();
        let queried = tokio::task::spawn_blocking(move || analytics.snapshot())
            .await
            .map_err(|err| RefreshError::Join(err.to_string()))?;
        match queried {
            Ok(snapshot) => Ok(snapshot),
            Err(err) => {
                warn!(error = %err, "store query failed, summarizing logs directly");
                self.summarize_logs().await
            }
        }
    }

    async fn summarize_logs(&self) -> RefreshResult {
        let roots = self.config.log_roots();
        let horizon = self.config.retention_horizon(Utc::now());
        let pricing = self.pricing.clone();
        tokio::task::spawn_blocking(move || {
            ingest::summarize_logs(&roots, Some(horizon), &pricing, &Local::now()).snapshot
        })
        .await
        .map_err(|err| RefreshError::Join(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use tracker_core::{UsagePeriod, UsageSummary};

    fn snapshot() -> UsageSnapshot {
        let now = Utc::now();
        UsageSnapshot {
            today: UsageSummary::empty(UsagePeriod::Today, now),
            last_30_days: UsageSummary::empty(UsagePeriod::Last30Days, now),
            by_model: Default::default(),
            computed_at: now,
        }
    }

    #[test]
    fn cache_expires_with_the_day() {
        let today = Local::now().date_naive();
        let tomorrow = today.checked_add_days(Days::new(1)).expect("tomorrow");
        let mut cache = SnapshotCache::default();
        assert!(cache.get(today).is_none());
        cache.put(today, snapshot());
        assert!(cache.get(today).is_some());
        assert!(cache.get(tomorrow).is_none());
        cache.clear();
        assert!(cache.get(today).is_none());
    }

    #[test]
    fn stored_snapshot_is_keyed_by_its_computation_day() {
        let mut computed = snapshot();
        computed.computed_at = Utc::now() - chrono::Duration::days(2);
        let computed_day = computed.computed_at.with_timezone(&Local).date_naive();
        let mut cache = SnapshotCache::default();
        cache.store(computed);
        assert!(cache.get(computed_day).is_some());
        assert!(cache.get(Local::now().date_naive()).is_none());
    }
}
