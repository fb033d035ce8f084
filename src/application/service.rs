use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{
    Account, Clock, Entry, Ledger, LedgerError, LedgerInput, MeasureDefinition, MeasureType,
    Period, SystemClock, Timestamp, Usage,
};
use crate::storage::Repository;

use super::AppError;

/// Application service over persisted ledgers.
///
/// Every write is a read-modify-write of one account's usage column. Nothing
/// here coordinates concurrent writers; callers that share an account across
/// tasks must serialize access themselves.
pub struct MeterService {
    repo: Repository,
    clock: Arc<dyn Clock>,
}

/// Current usage of one measure, for summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureStatus {
    pub name: String,
    pub measure_type: MeasureType,
    pub usage: Usage,
    pub can_use: bool,
}

impl MeterService {
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for every ledger this service loads.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Account operations
    // ========================

    /// Create an account with a ledger built from `input`.
    #[instrument(level = "debug", skip(self, input))]
    pub async fn create_account(
        &self,
        name: &str,
        input: LedgerInput,
    ) -> Result<Account, AppError> {
        if self.repo.get_account_by_name(name).await?.is_some() {
            return Err(AppError::AccountAlreadyExists(name.to_string()));
        }

        let ledger = Ledger::make(input)?;
        let account = Account::new(name.to_string(), ledger);
        self.repo.save_account(&account).await?;
        Ok(self.attach_clock(account))
    }

    pub async fn get_account(&self, name: &str) -> Result<Account, AppError> {
        self.repo
            .get_account_by_name(name)
            .await?
            .map(|account| self.attach_clock(account))
            .ok_or_else(|| AppError::AccountNotFound(name.to_string()))
    }

    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self
            .repo
            .list_accounts()
            .await?
            .into_iter()
            .map(|account| self.attach_clock(account))
            .collect())
    }

    /// Load the ledger of an account.
    pub async fn ledger(&self, account: &str) -> Result<Ledger, AppError> {
        Ok(self.get_account(account).await?.usage)
    }

    fn attach_clock(&self, mut account: Account) -> Account {
        account.usage.set_clock(Arc::clone(&self.clock));
        account
    }

    /// Apply `op` to an account's ledger and store the result.
    /// Nothing is stored when `op` fails.
    async fn update<T>(
        &self,
        account: &str,
        op: impl FnOnce(&mut Ledger) -> Result<T, LedgerError>,
    ) -> Result<T, AppError> {
        let mut account = self.get_account(account).await?;
        let value = op(&mut account.usage)?;
        self.repo.store_usage(account.id, &account.usage).await?;
        Ok(value)
    }

    // ========================
    // Measure operations
    // ========================

    #[instrument(level = "debug", skip(self, definition), fields(measure = %definition.name))]
    pub async fn add_measure(
        &self,
        account: &str,
        definition: MeasureDefinition,
    ) -> Result<(), AppError> {
        self.update(account, |ledger| {
            let default_tags: Vec<&str> =
                definition.default_tags.iter().map(String::as_str).collect();
            ledger.add_measure(
                &definition.name,
                definition.measure_type,
                definition.limit,
                &default_tags,
            )
        })
        .await
    }

    pub async fn remove_measure(&self, account: &str, measure: &str) -> Result<(), AppError> {
        self.update(account, |ledger| {
            ledger.remove_measure(measure);
            Ok(())
        })
        .await
    }

    pub async fn set_measure_limit(
        &self,
        account: &str,
        measure: &str,
        limit: Option<f64>,
    ) -> Result<(), AppError> {
        self.update(account, |ledger| ledger.set_measure_limit(measure, limit))
            .await
    }

    // ========================
    // Usage operations
    // ========================

    /// Record usage against a measure of an account.
    #[instrument(level = "debug", skip(self, tags, ts))]
    pub async fn increment(
        &self,
        account: &str,
        measure: &str,
        count: u32,
        tags: &[&str],
        ts: Option<DateTime<Utc>>,
    ) -> Result<Entry, AppError> {
        self.update(account, |ledger| ledger.increment(measure, count, tags, ts))
            .await
    }

    pub async fn usage(
        &self,
        account: &str,
        measure: &str,
        tags: &[&str],
        period: Option<Period>,
    ) -> Result<Usage, AppError> {
        Ok(self.ledger(account).await?.usage(measure, tags, period)?)
    }

    pub async fn can_use(
        &self,
        account: &str,
        measure: &str,
        count: u32,
        tags: &[&str],
    ) -> Result<bool, AppError> {
        Ok(self.ledger(account).await?.can_use(measure, count, tags, None))
    }

    /// Open a new period on an account's ledger.
    pub async fn new_period(
        &self,
        account: &str,
        ts: Option<DateTime<Utc>>,
    ) -> Result<Timestamp, AppError> {
        let opened = self.update(account, |ledger| ledger.new_period(ts)).await?;
        debug!(account, ts = opened, "period opened");
        Ok(opened)
    }

    /// Clear the named measures, or every measure when `measures` is `None`.
    pub async fn clear(&self, account: &str, measures: Option<&[&str]>) -> Result<(), AppError> {
        self.update(account, |ledger| match measures {
            Some(names) => ledger.clear_many(names),
            None => {
                ledger.clear_all();
                Ok(())
            }
        })
        .await
    }

    /// Current usage of every measure of an account, in name order.
    pub async fn usage_summary(&self, account: &str) -> Result<Vec<MeasureStatus>, AppError> {
        let ledger = self.ledger(account).await?;

        ledger
            .measure_names()
            .into_iter()
            .map(|name| {
                let measure = ledger.get_measure(name)?;
                let usage = ledger.usage(name, &[], None)?;
                Ok(MeasureStatus {
                    name: name.to_string(),
                    measure_type: measure.measure_type,
                    can_use: ledger.can_use(name, 1, &[], None),
                    usage,
                })
            })
            .collect()
    }
}
