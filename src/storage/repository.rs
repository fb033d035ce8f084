use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Account, AccountId, Ledger};

use super::MIGRATION_001_INITIAL;
use super::codec;

/// Repository for persisting accounts and the usage ledger attached to each.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Account operations
    // ========================

    /// Save a new account together with its ledger.
    pub async fn save_account(&self, account: &Account) -> Result<()> {
        let usage = codec::encode(&account.usage).context("Failed to encode usage")?;

        sqlx::query(
            r#"
            INSERT INTO accounts (id, name, usage, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(account.id.to_string())
        .bind(&account.name)
        .bind(&usage)
        .bind(account.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save account")?;

        debug!(account = %account.id, name = %account.name, "account saved");
        Ok(())
    }

    /// Get an account by name.
    pub async fn get_account_by_name(&self, name: &str) -> Result<Option<Account>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, usage, created_at
            FROM accounts
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch account by name")?;

        row.as_ref().map(Self::row_to_account).transpose()
    }

    /// List all accounts, ordered by name.
    pub async fn list_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query("SELECT id, name, usage, created_at FROM accounts ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list accounts")?;

        rows.iter().map(Self::row_to_account).collect()
    }

    // ========================
    // Usage column
    // ========================

    /// Load only the ledger of an account.
    pub async fn load_usage(&self, id: AccountId) -> Result<Option<Ledger>> {
        let row = sqlx::query("SELECT usage FROM accounts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch usage")?;

        row.map(|row| {
            let raw: Option<String> = row.get("usage");
            codec::decode(raw.as_deref()).context("Invalid usage column")
        })
        .transpose()
    }

    /// Overwrite the ledger of an account.
    pub async fn store_usage(&self, id: AccountId, ledger: &Ledger) -> Result<()> {
        let usage = codec::encode(ledger).context("Failed to encode usage")?;

        let result = sqlx::query("UPDATE accounts SET usage = ? WHERE id = ?")
            .bind(&usage)
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to store usage")?;

        if result.rows_affected() == 0 {
            anyhow::bail!("Account {} does not exist", id);
        }

        debug!(account = %id, bytes = usage.len(), "usage stored");
        Ok(())
    }

    fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Result<Account> {
        let id_str: String = row.get("id");
        let usage: Option<String> = row.get("usage");
        let created_at_str: String = row.get("created_at");

        Ok(Account {
            id: Uuid::parse_str(&id_str).context("Invalid account ID")?,
            name: row.get("name"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            usage: codec::decode(usage.as_deref()).context("Invalid usage column")?,
        })
    }
}
