use serde::{Deserialize, Serialize};

use super::Timestamp;

/// How a caller restricts a read to a slice of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Window ends at the given instant; its start is resolved from the measure type.
    Until(Timestamp),
    /// Explicit window, both ends inclusive. Type based resolution is skipped.
    Between(Timestamp, Timestamp),
}

/// Inclusive `[start, end]` range of timestamps over which entries are summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl Window {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: Timestamp) -> bool {
        self.start <= ts && ts <= self.end
    }

    /// Resolve an optional caller period into a concrete window.
    pub fn resolve(period: Option<Period>, default_start: Timestamp, now: Timestamp) -> Self {
        match period {
            Some(Period::Between(start, end)) => Self::new(start, end),
            Some(Period::Until(end)) => Self::new(default_start, end),
            None => Self::new(default_start, now),
        }
    }
}
