//! # UsageMap
//! Completed calculations per calendar day. Grows without pruning; readers only look at a trailing window.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct UsageMap {
    counts: BTreeMap<NaiveDate, u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UsageDay {
    pub date: NaiveDate,
    pub count: u32,
}

impl UsageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump the bucket for `date` and return its new value.
    pub fn increment(&mut self, date: NaiveDate) -> u32 {
        let count = self.counts.entry(date).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub fn count(&self, date: NaiveDate) -> u32 {
        self.counts.get(&date).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().map(|&count| u64::from(count)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// The `days`-long window ending at `today`, oldest first. Days without activity are zero.
    pub fn window(&self, today: NaiveDate, days: u32) -> Vec<UsageDay> {
        (0..days)
            .rev()
            .filter_map(|offset| today.checked_sub_days(Days::new(u64::from(offset))))
            .map(|date| UsageDay {
                date,
                count: self.count(date),
            })
            .collect()
    }
}
