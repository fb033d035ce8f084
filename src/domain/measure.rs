use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Entry, LedgerError, Result};

/// Tags attached to an entry or a measure. Kept as a set so merges deduplicate.
pub type Tags = BTreeSet<String>;

pub fn tags<I, S>(items: I) -> Tags
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasureType {
    /// Usage resets every time a new period is opened
    #[default]
    Metered,
    /// Usage accumulates from the start of periods, forever
    Volume,
    /// On/off gate, usually with a limit of 0 or no limit at all
    Feature,
}

impl MeasureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasureType::Metered => "metered",
            MeasureType::Volume => "volume",
            MeasureType::Feature => "feature",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "metered" => Some(MeasureType::Metered),
            "volume" => Some(MeasureType::Volume),
            "feature" => Some(MeasureType::Feature),
            _ => None,
        }
    }

    /// Returns true if usage survives period boundaries.
    pub fn is_cumulative(&self) -> bool {
        match self {
            MeasureType::Volume => true,
            MeasureType::Metered | MeasureType::Feature => false,
        }
    }
}

impl std::fmt::Display for MeasureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A limit is a non-negative, finite quota. `None` means unlimited.
pub fn validate_limit(limit: Option<f64>) -> Result<Option<f64>> {
    match limit {
        Some(value) if !value.is_finite() || value < 0.0 => Err(LedgerError::ValidationFailed(
            format!("limit must be a non-negative number, got {value}"),
        )),
        other => Ok(other),
    }
}

/// Configuration of a measure, without its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureDefinition {
    pub name: String,
    pub measure_type: MeasureType,
    pub limit: Option<f64>,
    pub default_tags: Tags,
}

impl MeasureDefinition {
    pub fn new(name: impl Into<String>, measure_type: MeasureType) -> Self {
        Self {
            name: name.into(),
            measure_type,
            limit: None,
            default_tags: Tags::new(),
        }
    }

    pub fn with_limit(mut self, limit: f64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_default_tags<I, S>(mut self, default_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_tags = tags(default_tags);
        self
    }
}

/// A measure as read back from a ledger: its configuration plus its entry log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    pub name: String,
    pub measure_type: MeasureType,
    pub limit: Option<f64>,
    pub default_tags: Tags,
    pub entries: Vec<Entry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_type_roundtrip() {
        for mt in [MeasureType::Metered, MeasureType::Volume, MeasureType::Feature] {
            let parsed = MeasureType::from_str(mt.as_str()).unwrap();
            assert_eq!(mt, parsed);
        }
    }

    #[test]
    fn test_measure_type_parse_is_case_insensitive() {
        assert_eq!(MeasureType::from_str("VOLUME"), Some(MeasureType::Volume));
        assert_eq!(MeasureType::from_str("seats"), None);
    }

    #[test]
    fn test_measure_type_serializes_lowercase() {
        let json = serde_json::to_string(&MeasureType::Feature).unwrap();
        assert_eq!(json, "\"feature\"");
        assert!(serde_json::from_str::<MeasureType>("\"hourly\"").is_err());
    }

    #[test]
    fn test_only_volume_is_cumulative() {
        assert!(MeasureType::Volume.is_cumulative());
        assert!(!MeasureType::Metered.is_cumulative());
        assert!(!MeasureType::Feature.is_cumulative());
    }

    #[test]
    fn test_validate_limit() {
        assert_eq!(validate_limit(None), Ok(None));
        assert_eq!(validate_limit(Some(0.0)), Ok(Some(0.0)));
        assert!(validate_limit(Some(-1.0)).is_err());
        assert!(validate_limit(Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_definition_builder_dedups_tags() {
        let def = MeasureDefinition::new("orders", MeasureType::Metered)
            .with_limit(10.0)
            .with_default_tags(["sales", "sales", "web"]);
        assert_eq!(def.limit, Some(10.0));
        assert_eq!(def.default_tags.len(), 2);
    }
}
