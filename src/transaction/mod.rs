pub mod ledger;
pub mod model;

pub use ledger::{Ledger, LedgerError};
pub use model::{Sender, SigningError, Transaction};

/// Fixed token supply used to seed first-time senders and the reward pool.
pub const TOTAL_SUPPLY: u64 = 1_000_000;
