// 🏷️ Balance Rules - Rules as Data
// Every transaction kind maps to one rule: which side gains and how much of the amount moves.

use crate::error::ValidationError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// TRANSACTION KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Actor paid, cost split 50/50
    SelfPaidSplit,
    /// Actor paid in full for the counterparty (actor is owed all of it)
    SelfPaidFull,
    /// Counterparty paid, cost split 50/50
    OtherPaidSplit,
    /// Counterparty paid in full for the actor (actor owes all of it)
    OtherPaidFull,
    /// Counterparty paid the actor back
    OtherSettled,
    /// Actor paid the counterparty back
    SelfSettled,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 6] = [
        TransactionKind::SelfPaidSplit,
        TransactionKind::SelfPaidFull,
        TransactionKind::OtherPaidSplit,
        TransactionKind::OtherPaidFull,
        TransactionKind::OtherSettled,
        TransactionKind::SelfSettled,
    ];

    /// Look up the balance rule for this kind
    pub fn rule(self) -> BalanceRule {
        use Share::{Full, Half};
        use Side::{Actor, Counterparty};

        match self {
            TransactionKind::SelfPaidSplit => BalanceRule::new(Actor, Half),
            TransactionKind::SelfPaidFull => BalanceRule::new(Actor, Full),
            TransactionKind::OtherPaidSplit => BalanceRule::new(Counterparty, Half),
            TransactionKind::OtherPaidFull => BalanceRule::new(Counterparty, Full),
            TransactionKind::OtherSettled => BalanceRule::new(Counterparty, Full),
            TransactionKind::SelfSettled => BalanceRule::new(Actor, Full),
        }
    }

    /// Human-readable label, written from the actor's point of view
    pub fn label(self) -> &'static str {
        match self {
            TransactionKind::SelfPaidSplit => "You Paid - Split 50/50",
            TransactionKind::SelfPaidFull => {
                "You Paid - In Full for Them (You're owed all of it)"
            }
            TransactionKind::OtherPaidSplit => "They Paid - Split 50/50",
            TransactionKind::OtherPaidFull => "They Paid - In Full for You (You owe all of it)",
            TransactionKind::OtherSettled => "They Paid You (Settlement)",
            TransactionKind::SelfSettled => "You Paid Them (Settlement)",
        }
    }

    /// Stable snake_case tag, same as the serialized form
    pub fn tag(self) -> &'static str {
        match self {
            TransactionKind::SelfPaidSplit => "self_paid_split",
            TransactionKind::SelfPaidFull => "self_paid_full",
            TransactionKind::OtherPaidSplit => "other_paid_split",
            TransactionKind::OtherPaidFull => "other_paid_full",
            TransactionKind::OtherSettled => "other_settled",
            TransactionKind::SelfSettled => "self_settled",
        }
    }

    pub fn is_settlement(self) -> bool {
        matches!(self, TransactionKind::OtherSettled | TransactionKind::SelfSettled)
    }

    /// Signed change to the actor's balance; the counterparty gets the negation
    pub fn actor_delta(self, amount: Decimal) -> Decimal {
        self.rule().actor_delta(amount)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TransactionKind {
    type Err = ValidationError;

    /// Accepts the snake_case tag or the display label (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();

        TransactionKind::ALL
            .into_iter()
            .find(|kind| {
                kind.tag().eq_ignore_ascii_case(needle) || kind.label().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| ValidationError::UnknownKind(s.to_string()))
    }
}

// ============================================================================
// BALANCE RULE
// ============================================================================

/// Which party's balance goes up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Actor,
    Counterparty,
}

/// How much of the amount moves between the two balances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Share {
    Half,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceRule {
    pub credited: Side,
    pub share: Share,
}

impl BalanceRule {
    pub const fn new(credited: Side, share: Share) -> Self {
        BalanceRule { credited, share }
    }

    pub fn moved(&self, amount: Decimal) -> Decimal {
        match self.share {
            Share::Half => amount / Decimal::TWO,
            Share::Full => amount,
        }
    }

    pub fn actor_delta(&self, amount: Decimal) -> Decimal {
        let moved = self.moved(amount);
        match self.credited {
            Side::Actor => moved,
            Side::Counterparty => -moved,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
