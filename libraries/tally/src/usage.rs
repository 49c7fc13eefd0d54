//! Daily usage counts, kept on the device only.

use chrono::{NaiveDate, Utc};

use crate::data_model::{UsageDay, UsageMap};
use crate::local_cache::LocalCache;
use crate::storage::KeyValueStore;

pub const DEFAULT_WINDOW_DAYS: u32 = 30;

pub struct UsageTracker<'a, S> {
    cache: &'a LocalCache<S>,
}

impl<'a, S: KeyValueStore> UsageTracker<'a, S> {
    pub fn new(cache: &'a LocalCache<S>) -> Self {
        Self { cache }
    }

    /// Count one completed calculation for today (UTC).
    pub fn record_usage(&self) -> UsageMap {
        self.record_usage_on(Utc::now().date_naive())
    }

    pub fn record_usage_on(&self, date: NaiveDate) -> UsageMap {
        let mut usage = self.cache.load_usage();
        let count = usage.increment(date);
        log::debug!("{count} calculations on {date}");
        self.cache.save_usage(&usage);
        usage
    }

    pub fn usage(&self) -> UsageMap {
        self.cache.load_usage()
    }
}

/// How busy a day was compared to the busiest day in its window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum Intensity {
    Empty,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl Intensity {
    pub fn relative_to(count: u32, peak: u32) -> Self {
        if count == 0 {
            return Intensity::Empty;
        }
        let ratio = f64::from(count) / f64::from(peak.max(1));
        if ratio <= 0.25 {
            Intensity::Low
        } else if ratio <= 0.5 {
            Intensity::Medium
        } else if ratio <= 0.75 {
            Intensity::High
        } else {
            Intensity::VeryHigh
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UsageWindow {
    /// Oldest first, one entry per day.
    pub days: Vec<UsageDay>,
    pub total: u64,
    /// Highest single-day count in the window, at least 1.
    pub peak: u32,
}

impl UsageWindow {
    pub fn intensity(&self, day: &UsageDay) -> Intensity {
        Intensity::relative_to(day.count, self.peak)
    }
}

pub fn usage_window(usage: &UsageMap, today: NaiveDate, days: u32) -> UsageWindow {
    let days = usage.window(today, days);
    let total = days.iter().map(|day| u64::from(day.count)).sum();
    let peak = days.iter().map(|day| day.count).max().unwrap_or(0).max(1);
    UsageWindow { days, total, peak }
}
