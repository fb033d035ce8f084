//! Text encoding of a ledger for storage in a single column.

use thiserror::Error;

use crate::domain::{Ledger, LedgerError, LedgerSnapshot};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed usage JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Invalid usage data: {0}")]
    Invalid(#[from] LedgerError),
}

/// Encode a ledger into its JSON transport form.
pub fn encode(ledger: &Ledger) -> Result<String, CodecError> {
    Ok(serde_json::to_string(&ledger.to_snapshot())?)
}

/// Decode a stored column. A missing, empty or `null` value is an empty ledger.
pub fn decode(raw: Option<&str>) -> Result<Ledger, CodecError> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Ok(Ledger::default()),
        Some(raw) => raw,
    };

    let snapshot: Option<LedgerSnapshot> = serde_json::from_str(raw)?;
    Ok(Ledger::from_snapshot(snapshot.unwrap_or_default())?)
}
