use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    Clock, Entry, LedgerError, LedgerInput, LedgerSnapshot, Measure, MeasureRecord, MeasureType,
    Period, Result, SystemClock, Tags, Timestamp, Usage, Window, tags, validate_limit,
};

/// A usage ledger: named measures, their entry logs, and the period markers
/// that decide which entries count.
///
/// The ledger is a plain value owned by one caller at a time. It never persists
/// itself; see [`LedgerSnapshot`] for the transport form.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "LedgerSnapshot", into = "LedgerSnapshot")]
pub struct Ledger {
    start_of_periods: Timestamp,
    periods: Vec<Timestamp>,
    measures: BTreeMap<String, MeasureRecord>,
    clock: Arc<dyn Clock>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("start_of_periods", &self.start_of_periods)
            .field("periods", &self.periods)
            .field("measures", &self.measures)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Ledger {
    fn eq(&self, other: &Self) -> bool {
        self.start_of_periods == other.start_of_periods
            && self.periods == other.periods
            && self.measures == other.measures
    }
}

impl TryFrom<LedgerSnapshot> for Ledger {
    type Error = LedgerError;

    fn try_from(snapshot: LedgerSnapshot) -> Result<Self> {
        Self::from_snapshot(snapshot)
    }
}

impl From<Ledger> for LedgerSnapshot {
    fn from(ledger: Ledger) -> Self {
        Self {
            start_of_periods: ledger.start_of_periods,
            periods: ledger.periods,
            measures: ledger.measures,
        }
    }
}

impl Ledger {
    /// Create an empty ledger anchored at `start_of_periods`.
    pub fn new(start_of_periods: Timestamp) -> Self {
        Self {
            start_of_periods,
            periods: Vec::new(),
            measures: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Build a ledger from structured input. Every measure starts with an empty log.
    pub fn make(input: LedgerInput) -> Result<Self> {
        Self::from_snapshot(input.into())
    }

    /// Rehydrate a ledger from its transport form.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Result<Self> {
        snapshot.validate()?;
        Ok(Self {
            start_of_periods: snapshot.start_of_periods,
            periods: snapshot.periods,
            measures: snapshot.measures,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn to_snapshot(&self) -> LedgerSnapshot {
        self.clone().into()
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    fn now(&self) -> Timestamp {
        self.clock.now_ts()
    }

    // ========================
    // Measure registry
    // ========================

    /// Add a measure, or restate the configuration of an existing one.
    /// Restating never touches the entries already recorded.
    pub fn add_measure(
        &mut self,
        name: &str,
        measure_type: MeasureType,
        limit: Option<f64>,
        default_tags: &[&str],
    ) -> Result<()> {
        let limit = validate_limit(limit)?;
        let record = self.measures.entry(name.to_string()).or_default();
        record.measure_type = measure_type;
        record.limit = limit;
        record.default_tags = tags(default_tags.iter().copied());

        debug!(measure = name, %measure_type, ?limit, "measure configured");
        Ok(())
    }

    /// Remove a measure and its whole entry log. Unknown names are ignored.
    pub fn remove_measure(&mut self, name: &str) {
        if self.measures.remove(name).is_some() {
            debug!(measure = name, "measure removed");
        }
    }

    pub fn has_measure(&self, name: &str) -> bool {
        self.measures.contains_key(name)
    }

    pub fn get_measure(&self, name: &str) -> Result<Measure> {
        let record = self.record(name)?;
        Ok(Measure {
            name: name.to_string(),
            measure_type: record.measure_type,
            limit: record.limit,
            default_tags: record.default_tags.clone(),
            entries: record.entries.clone(),
        })
    }

    /// Names of all registered measures, in name order.
    pub fn measure_names(&self) -> Vec<&str> {
        self.measures.keys().map(String::as_str).collect()
    }

    pub fn set_measure_type(&mut self, name: &str, measure_type: MeasureType) -> Result<()> {
        self.record_mut(name)?.measure_type = measure_type;
        Ok(())
    }

    /// Set or lift (`None`) a measure's limit.
    pub fn set_measure_limit(&mut self, name: &str, limit: Option<f64>) -> Result<()> {
        let limit = validate_limit(limit)?;
        self.record_mut(name)?.limit = limit;
        Ok(())
    }

    pub fn set_measure_default_tags(&mut self, name: &str, default_tags: &[&str]) -> Result<()> {
        self.record_mut(name)?.default_tags = tags(default_tags.iter().copied());
        Ok(())
    }

    fn record(&self, name: &str) -> Result<&MeasureRecord> {
        self.measures
            .get(name)
            .ok_or_else(|| LedgerError::MeasureUnknown(name.to_string()))
    }

    fn record_mut(&mut self, name: &str) -> Result<&mut MeasureRecord> {
        self.measures
            .get_mut(name)
            .ok_or_else(|| LedgerError::MeasureUnknown(name.to_string()))
    }

    // ========================
    // Entry log
    // ========================

    /// Record `count` units of usage against a measure.
    ///
    /// The quota is checked first and nothing is written when it would be
    /// exceeded. `ts` defaults to now; back- and post-dated entries are accepted.
    pub fn increment(
        &mut self,
        name: &str,
        count: u32,
        entry_tags: &[&str],
        ts: Option<DateTime<Utc>>,
    ) -> Result<Entry> {
        if !self.can_use(name, count, entry_tags, None) {
            warn!(measure = name, count, "usage rejected, measure exhausted");
            return Err(LedgerError::MeasureExhausted {
                measure: name.to_string(),
                requested: count,
            });
        }

        let ts = ts.map_or_else(|| self.now(), |ts| ts.timestamp());
        let record = self.record_mut(name)?;

        let mut merged = tags(entry_tags.iter().copied());
        merged.extend(record.default_tags.iter().cloned());

        let entry = Entry::new(ts, count, merged)?;
        record.entries.push(entry.clone());

        debug!(measure = name, count, ts, "usage recorded");
        Ok(entry)
    }

    /// Entries of a measure inside a window, oldest first, optionally
    /// restricted to those sharing any of `filter_tags`.
    ///
    /// Without an explicit window the current period is used.
    pub fn measure_entries(
        &self,
        name: &str,
        filter_tags: &[&str],
        period: Option<Period>,
    ) -> Result<Vec<Entry>> {
        let record = self.record(name)?;
        let window = Window::resolve(period, self.last_period(), self.now());
        let filter = tags(filter_tags.iter().copied());

        Ok(select_entries(record, &filter, window)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Empty the entry log of one measure.
    pub fn clear(&mut self, name: &str) -> Result<()> {
        self.record_mut(name)?.entries.clear();
        debug!(measure = name, "entries cleared");
        Ok(())
    }

    /// Empty the entry logs of several measures, in order.
    ///
    /// Stops at the first unknown name; measures cleared before it stay cleared.
    pub fn clear_many(&mut self, names: &[&str]) -> Result<()> {
        for name in names {
            self.clear(name)?;
        }
        Ok(())
    }

    /// Empty the entry log of every measure.
    pub fn clear_all(&mut self) {
        for record in self.measures.values_mut() {
            record.entries.clear();
        }
        debug!(measures = self.measures.len(), "all entries cleared");
    }

    // ========================
    // Periods
    // ========================

    pub fn start_of_periods(&self) -> Timestamp {
        self.start_of_periods
    }

    pub fn periods(&self) -> &[Timestamp] {
        &self.periods
    }

    /// The most recently opened period, or the start of periods if none was opened.
    pub fn last_period(&self) -> Timestamp {
        self.periods
            .last()
            .copied()
            .unwrap_or(self.start_of_periods)
    }

    /// Open a new period at `ts` (default now). Must be later than the latest period.
    pub fn new_period(&mut self, ts: Option<DateTime<Utc>>) -> Result<Timestamp> {
        let ts = ts.map_or_else(|| self.now(), |ts| ts.timestamp());

        if let Some(&latest) = self.periods.last() {
            if ts <= latest {
                return Err(LedgerError::InvalidPeriod {
                    requested: ts,
                    latest,
                });
            }
        }

        self.periods.push(ts);
        debug!(ts, periods = self.periods.len(), "period opened");
        Ok(ts)
    }

    /// Start of the default window for a measure type.
    fn window_start(&self, measure_type: MeasureType) -> Timestamp {
        if measure_type.is_cumulative() {
            self.start_of_periods
        } else {
            self.last_period()
        }
    }

    // ========================
    // Quota
    // ========================

    /// Sum the usage of a measure.
    ///
    /// Without an explicit [`Period::Between`], volume measures count from the
    /// start of periods and the other types from the latest period.
    pub fn usage(&self, name: &str, filter_tags: &[&str], period: Option<Period>) -> Result<Usage> {
        let record = self.record(name)?;
        let window = Window::resolve(period, self.window_start(record.measure_type), self.now());
        Ok(tally(record, filter_tags, window))
    }

    /// Whether `count` more units fit under the measure's limit.
    ///
    /// A measure without a limit is always usable, and so is an unknown
    /// measure. The default window here always starts at the latest period,
    /// whatever the measure type.
    pub fn can_use(
        &self,
        name: &str,
        count: u32,
        filter_tags: &[&str],
        period: Option<Period>,
    ) -> bool {
        let Some(record) = self.measures.get(name) else {
            return true;
        };
        if record.limit.is_none() {
            return true;
        }

        let window = Window::resolve(period, self.last_period(), self.now());
        tally(record, filter_tags, window).allows(count)
    }
}

fn tally(record: &MeasureRecord, filter_tags: &[&str], window: Window) -> Usage {
    let filter = tags(filter_tags.iter().copied());
    let entries = select_entries(record, &filter, window);
    Usage {
        count: entries.iter().map(|e| u64::from(e.count)).sum(),
        limit: record.limit,
        entries: entries.len(),
        window,
    }
}

fn select_entries<'a>(record: &'a MeasureRecord, filter: &Tags, window: Window) -> Vec<&'a Entry> {
    let mut entries: Vec<&Entry> = record
        .entries
        .iter()
        .filter(|e| window.contains(e.ts) && e.matches_any(filter))
        .collect();
    entries.sort_by_key(|e| e.ts);
    entries
}
