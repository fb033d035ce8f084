use std::collections::BTreeMap;

use serde::de::{Error as _, IgnoredAny};
use serde::{Deserialize, Deserializer, Serialize};

use super::{
    Entry, LedgerError, MeasureDefinition, MeasureType, Result, Tags, Timestamp, validate_limit,
};

/// The canonical transport form of a ledger.
///
/// This is what gets written to and read from the owning record's column:
///
/// ```json
/// {
///   "startOfPeriods": 1700000000,
///   "periods": [1702592000],
///   "measures": {
///     "orders": {"type": "metered", "limit": 100, "defaultTags": ["sales"],
///                "entries": [{"ts": 1702600000, "count": 1, "tags": ["sales"]}]}
///   }
/// }
/// ```
///
/// Every key is optional on the way in so that an empty or partially written
/// blob still loads. An empty `measures` list (`[]`) reads as no measures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LedgerSnapshot {
    pub start_of_periods: Timestamp,
    pub periods: Vec<Timestamp>,
    #[serde(deserialize_with = "measures_or_empty_list")]
    pub measures: BTreeMap<String, MeasureRecord>,
}

fn measures_or_empty_list<'de, D>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, MeasureRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Measures {
        Map(BTreeMap<String, MeasureRecord>),
        List(Vec<IgnoredAny>),
    }

    match Measures::deserialize(deserializer)? {
        Measures::Map(map) => Ok(map),
        Measures::List(items) if items.is_empty() => Ok(BTreeMap::new()),
        Measures::List(items) => Err(D::Error::invalid_length(
            items.len(),
            &"a map of measures or an empty list",
        )),
    }
}

/// A measure keyed by name inside a snapshot. The name is the map key, not a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeasureRecord {
    #[serde(rename = "type")]
    pub measure_type: MeasureType,
    pub limit: Option<f64>,
    pub default_tags: Tags,
    pub entries: Vec<Entry>,
}

impl MeasureRecord {
    pub fn new(measure_type: MeasureType, limit: Option<f64>, default_tags: Tags) -> Self {
        Self {
            measure_type,
            limit,
            default_tags,
            entries: Vec::new(),
        }
    }
}

impl LedgerSnapshot {
    /// Check the invariants a loaded blob must hold before it becomes a ledger.
    pub fn validate(&self) -> Result<()> {
        for pair in self.periods.windows(2) {
            if pair[1] <= pair[0] {
                return Err(LedgerError::InvalidPeriod {
                    requested: pair[1],
                    latest: pair[0],
                });
            }
        }

        for (name, record) in &self.measures {
            validate_limit(record.limit).map_err(|e| in_measure(name, e))?;
            for entry in &record.entries {
                entry.validate().map_err(|e| in_measure(name, e))?;
            }
        }

        Ok(())
    }
}

fn in_measure(name: &str, err: LedgerError) -> LedgerError {
    match err {
        LedgerError::ValidationFailed(msg) => {
            LedgerError::ValidationFailed(format!("measure {name}: {msg}"))
        }
        other => other,
    }
}

/// Structured input for building a ledger with a known set of measures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerInput {
    pub start_of_periods: Timestamp,
    pub periods: Vec<Timestamp>,
    pub measures: Vec<MeasureDefinition>,
}

impl LedgerInput {
    pub fn new(start_of_periods: Timestamp) -> Self {
        Self {
            start_of_periods,
            ..Default::default()
        }
    }

    pub fn with_measure(mut self, measure: MeasureDefinition) -> Self {
        self.measures.push(measure);
        self
    }
}

impl From<LedgerInput> for LedgerSnapshot {
    fn from(input: LedgerInput) -> Self {
        Self {
            start_of_periods: input.start_of_periods,
            periods: input.periods,
            measures: input
                .measures
                .into_iter()
                .map(|def| {
                    let record = MeasureRecord::new(def.measure_type, def.limit, def.default_tags);
                    (def.name, record)
                })
                .collect(),
        }
    }
}
