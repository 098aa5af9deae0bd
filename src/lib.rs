// Split Tracker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod db;
pub mod error;
pub mod ledger;
pub mod rules;
pub mod session;
pub mod settings;
pub mod settlement;

// Re-export commonly used types
pub use db::{setup_database, LedgerStore, MemoryStore, SqliteStore, LEDGER_KEY};
pub use error::{LedgerError, ValidationError};
pub use ledger::{
    format_money, format_timestamp, parse_amount, round_amount,
    Ledger, MAX_AMOUNT, Party, PartyRole, Transaction,
};
pub use rules::{BalanceRule, Share, Side, TransactionKind};
pub use session::{ledger_error, validation_error, Session, Summary};
pub use settings::Settings;
pub use settlement::{settlement, Direction, Settlement};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How many transactions the history views show
pub const RECENT_LIMIT: usize = 10;
