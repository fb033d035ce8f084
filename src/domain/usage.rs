use serde::{Deserialize, Serialize};

use super::Window;

/// Usage of a measure over a window. Derived on every query, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    /// Sum of the matching entries' counts
    pub count: u64,
    /// The measure's limit at query time
    pub limit: Option<f64>,
    /// Number of matching entries
    pub entries: usize,
    pub window: Window,
}

impl Usage {
    /// Fraction of the limit consumed. `None` when unlimited or the limit is zero.
    pub fn percentage(&self) -> Option<f64> {
        match self.limit {
            Some(limit) if limit != 0.0 => Some(self.count as f64 / limit),
            _ => None,
        }
    }

    /// Whether `count` more units would still fit under the limit.
    /// Reaching the limit exactly counts as exhausted.
    pub fn allows(&self, count: u32) -> bool {
        match self.limit {
            Some(limit) => ((self.count + u64::from(count)) as f64) < limit,
            None => true,
        }
    }

    pub fn remaining(&self) -> Option<f64> {
        self.limit.map(|limit| (limit - self.count as f64).max(0.0))
    }
}
