// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, Utc};
use meterbook::application::MeterService;
use meterbook::domain::{FixedClock, LedgerInput, MeasureDefinition, MeasureType, Timestamp};
use tempfile::TempDir;

/// 2023-11-14T22:13:20Z
pub const NOW: Timestamp = 1_700_000_000;
pub const DAY: Timestamp = 86_400;

/// Helper to create a test service with a temporary database and a clock frozen at `now`
pub async fn test_service_at(now: Timestamp) -> Result<(MeterService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = MeterService::init(db_path.to_str().unwrap())
        .await?
        .with_clock(FixedClock::at(now));
    Ok((service, temp_dir))
}

pub async fn test_service() -> Result<(MeterService, TempDir)> {
    test_service_at(NOW).await
}

pub fn at(ts: Timestamp) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
}

/// Test fixture: a subscription plan with the usual measures
pub struct StandardPlan;

impl StandardPlan {
    /// user_accounts (metered, limit 5), orders (metered, tagged "sales"),
    /// storage (volume, limit 100), exports (feature, disabled)
    pub fn input() -> LedgerInput {
        LedgerInput::new(0)
            .with_measure(
                MeasureDefinition::new("user_accounts", MeasureType::Metered).with_limit(5.0),
            )
            .with_measure(
                MeasureDefinition::new("orders", MeasureType::Metered)
                    .with_default_tags(["sales"]),
            )
            .with_measure(MeasureDefinition::new("storage", MeasureType::Volume).with_limit(100.0))
            .with_measure(MeasureDefinition::new("exports", MeasureType::Feature).with_limit(0.0))
    }

    pub async fn create(service: &MeterService, name: &str) -> Result<()> {
        service.create_account(name, Self::input()).await?;
        Ok(())
    }
}

/// Open a second service on the same database with the clock moved to `now`
pub async fn reopen_at(temp_dir: &TempDir, now: Timestamp) -> Result<MeterService> {
    let db_path = temp_dir.path().join("test.db");
    Ok(MeterService::connect(db_path.to_str().unwrap())
        .await?
        .with_clock(FixedClock::at(now)))
}
