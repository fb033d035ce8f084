use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Ledger;

pub type AccountId = Uuid;

/// The record a ledger is attached to, e.g. a subscription or a customer account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Usage ledger, persisted as a JSON blob alongside the row
    pub usage: Ledger,
}

impl Account {
    pub fn new(name: String, usage: Ledger) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            created_at: Utc::now(),
            usage,
        }
    }
}
