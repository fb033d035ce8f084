use serde::{Deserialize, Serialize};

use super::{LedgerError, Result, Tags, Timestamp};

pub const MIN_ENTRY_COUNT: u32 = 1;
pub const MAX_ENTRY_COUNT: u32 = 1000;

/// One recorded usage event. Entries are append-only; they are never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// When the usage occurred (may be back- or post-dated)
    pub ts: Timestamp,
    /// Amount of usage, 1..=1000
    pub count: u32,
    #[serde(default)]
    pub tags: Tags,
}

impl Entry {
    pub fn new(ts: Timestamp, count: u32, tags: Tags) -> Result<Self> {
        let entry = Self { ts, count, tags };
        entry.validate()?;
        Ok(entry)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_ENTRY_COUNT..=MAX_ENTRY_COUNT).contains(&self.count) {
            return Err(LedgerError::ValidationFailed(format!(
                "entry count must be between {MIN_ENTRY_COUNT} and {MAX_ENTRY_COUNT}, got {}",
                self.count
            )));
        }
        if self.ts < 0 {
            return Err(LedgerError::ValidationFailed(format!(
                "entry timestamp must not be negative, got {}",
                self.ts
            )));
        }
        Ok(())
    }

    /// True if this entry shares at least one tag with `filter`.
    /// An empty filter matches everything.
    pub fn matches_any(&self, filter: &Tags) -> bool {
        filter.is_empty() || !self.tags.is_disjoint(filter)
    }
}
