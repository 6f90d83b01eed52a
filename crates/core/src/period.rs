use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Fixed aggregation windows. `Today` starts at local midnight, the rest are
/// rolling windows ending now. Starts are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsagePeriod {
    Today,
    Last7Days,
    Last30Days,
    Last90Days,
    Last180Days,
    LastYear,
}

impl UsagePeriod {
    pub const ALL: [UsagePeriod; 6] = [
        UsagePeriod::Today,
        UsagePeriod::Last7Days,
        UsagePeriod::Last30Days,
        UsagePeriod::Last90Days,
        UsagePeriod::Last180Days,
        UsagePeriod::LastYear,
    ];

    pub fn days(self) -> Option<i64> {
        match self {
            UsagePeriod::Today => None,
            UsagePeriod::Last7Days => Some(7),
            UsagePeriod::Last30Days => Some(30),
            UsagePeriod::Last90Days => Some(90),
            UsagePeriod::Last180Days => Some(180),
            UsagePeriod::LastYear => Some(365),
        }
    }

    /// Start instant relative to `now`, truncated to milliseconds to match the
    /// precision timestamps are stored with.
    pub fn start_at<Tz: TimeZone>(self, now: &DateTime<Tz>) -> DateTime<Utc> {
        let start = match self.days() {
            Some(days) => now.with_timezone(&Utc) - Duration::days(days),
            None => local_midnight(now),
        };
        truncate_to_millis(start)
    }

    pub fn label(self) -> &'static str {
        match self {
            UsagePeriod::Today => "today",
            UsagePeriod::Last7Days => "7d",
            UsagePeriod::Last30Days => "30d",
            UsagePeriod::Last90Days => "90d",
            UsagePeriod::Last180Days => "180d",
            UsagePeriod::LastYear => "1y",
        }
    }
}

impl fmt::Display for UsagePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for UsagePeriod {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "today" => Ok(UsagePeriod::Today),
            "7d" | "7days" | "last7days" => Ok(UsagePeriod::Last7Days),
            "30d" | "30days" | "last30days" => Ok(UsagePeriod::Last30Days),
            "90d" | "90days" | "last90days" => Ok(UsagePeriod::Last90Days),
            "180d" | "180days" | "last180days" => Ok(UsagePeriod::Last180Days),
            "1y" | "year" | "lastyear" => Ok(UsagePeriod::LastYear),
            other => Err(format!("unsupported period {}", other)),
        }
    }
}

/// Midnight of `now`'s calendar day in its own zone. When midnight does not
/// exist (DST gap) the earliest valid instant of the day is used.
pub fn local_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    let zone = now.timezone();
    let date = now.date_naive();
    for hour in 0..24 {
        if let Some(naive) = date.and_hms_opt(hour, 0, 0)
            && let Some(start) = zone.from_local_datetime(&naive).earliest()
        {
            return start.with_timezone(&Utc);
        }
    }
    now.with_timezone(&Utc)
}

pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(3)
}
