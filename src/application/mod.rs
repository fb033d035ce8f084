// Application layer: loads an account's ledger, applies one operation,
// and writes the ledger back.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
