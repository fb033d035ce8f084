mod account;
mod clock;
mod entry;
mod error;
mod ledger;
mod measure;
mod period;
mod snapshot;
mod usage;

pub use account::*;
pub use clock::*;
pub use entry::*;
pub use error::*;
pub use ledger::*;
pub use measure::*;
pub use period::*;
pub use snapshot::*;
pub use usage::*;
