// ⚠️ Ledger Errors
// Local, recoverable failures surfaced to the caller for user-facing messages.
// Neither variant leaves the ledger half-updated.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Input rejected before any balance is touched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("amount {0} rounds to zero at cent precision")]
    RoundsToZero(Decimal),

    #[error("amount {amount} exceeds the maximum of {max}")]
    AmountTooLarge { amount: Decimal, max: Decimal },

    #[error("balance would overflow after applying {0}")]
    BalanceOverflow(Decimal),

    #[error("unknown transaction kind: {0:?}")]
    UnknownKind(String),

    #[error("{0:?} is not one of the two configured parties")]
    UnknownActor(String),

    #[error("invalid amount {0:?}")]
    MalformedAmount(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("transaction {0} not found in ledger")]
    NotFound(Uuid),
}

impl LedgerError {
    pub fn is_validation(&self) -> bool {
        matches!(self, LedgerError::Validation(_))
    }
}
