//! An embeddable usage-metering ledger.
//!
//! A [`Ledger`] records usage entries against named measures, partitions time
//! into periods, and answers whether a measure is still within its quota.
//! The [`storage`] and [`application`] layers persist ledgers as JSON blobs
//! attached to account rows in SQLite.

pub mod application;
pub mod domain;
pub mod storage;

pub use domain::*;
pub use storage::Repository;
