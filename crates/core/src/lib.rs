mod period;
mod pricing;

use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use period::{UsagePeriod, local_midnight, truncate_to_millis};
pub use pricing::{PricingRate, PricingRule, PricingTable, compute_cost_usd, model_matches_pattern};

/// Token counters for one record or an aggregate of many.
///
/// Addition saturates, so folding never panics on pathological logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenCount {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
}

impl TokenCount {
    pub const ZERO: TokenCount = TokenCount {
        input_tokens: 0,
        output_tokens: 0,
        cache_creation_tokens: 0,
        cache_read_tokens: 0,
    };

    pub fn total(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_creation_tokens)
            .saturating_add(self.cache_read_tokens)
    }

    pub fn merge(self, other: TokenCount) -> TokenCount {
        TokenCount {
            input_tokens: self.input_tokens.saturating_add(other.input_tokens),
            output_tokens: self.output_tokens.saturating_add(other.output_tokens),
            cache_creation_tokens: self
                .cache_creation_tokens
                .saturating_add(other.cache_creation_tokens),
            cache_read_tokens: self.cache_read_tokens.saturating_add(other.cache_read_tokens),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == TokenCount::ZERO
    }
}

impl Add for TokenCount {
    type Output = TokenCount;

    fn add(self, rhs: TokenCount) -> TokenCount {
        self.merge(rhs)
    }
}

impl AddAssign for TokenCount {
    fn add_assign(&mut self, rhs: TokenCount) {
        *self = self.merge(rhs);
    }
}

impl Sum for TokenCount {
    fn sum<I: Iterator<Item = TokenCount>>(iter: I) -> TokenCount {
        iter.fold(TokenCount::ZERO, TokenCount::merge)
    }
}

/// One usage-bearing log line after parsing. Never stored in this form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub model: String,
    pub usage: TokenCount,
    pub timestamp: DateTime<Utc>,
}

/// Identity of a logical event across duplicate log lines.
///
/// When either id is missing from the line, both slots hold a digest of the raw
/// line and `synthetic` is set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeId {
    pub primary_id: String,
    pub secondary_id: String,
    pub synthetic: bool,
}

impl CompositeId {
    pub fn new(primary_id: impl Into<String>, secondary_id: impl Into<String>) -> Self {
        Self {
            primary_id: primary_id.into(),
            secondary_id: secondary_id.into(),
            synthetic: false,
        }
    }

    pub fn synthetic(digest: impl Into<String>) -> Self {
        let digest = digest.into();
        Self {
            primary_id: digest.clone(),
            secondary_id: digest,
            synthetic: true,
        }
    }

    /// Durable unique key, `primary:secondary`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.primary_id, self.secondary_id)
    }
}

/// A parsed record paired with its identity; the unit handed to the importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedRecord {
    pub record: UsageRecord,
    pub id: CompositeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedUsageRecord {
    pub id: String,
    pub model: String,
    pub usage: TokenCount,
    pub timestamp: DateTime<Utc>,
    pub cost_usd: f64,
}

/// Progress through one log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    pub file_id: String,
    pub byte_offset: u64,
    pub file_size: u64,
    pub mtime: Option<DateTime<Utc>>,
}

impl FileState {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            byte_offset: 0,
            file_size: 0,
            mtime: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub period: UsagePeriod,
    pub start: DateTime<Utc>,
    pub usage: TokenCount,
    pub total_tokens: u64,
    pub total_cost_usd: f64,
    pub record_count: u64,
}

impl UsageSummary {
    pub fn empty(period: UsagePeriod, start: DateTime<Utc>) -> Self {
        Self {
            period,
            start,
            usage: TokenCount::ZERO,
            total_tokens: 0,
            total_cost_usd: 0.0,
            record_count: 0,
        }
    }

    pub fn add(&mut self, usage: TokenCount, cost_usd: f64) {
        self.usage += usage;
        self.total_tokens = self.usage.total();
        self.total_cost_usd += cost_usd;
        self.record_count += 1;
    }
}

/// Bundle handed to presentation layers after each refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub today: UsageSummary,
    pub last_30_days: UsageSummary,
    pub by_model: BTreeMap<String, TokenCount>,
    pub computed_at: DateTime<Utc>,
}
