// 🤝 Settlement Calculator
// With a zero-sum ledger, party_a's balance alone decides who owes whom.

use crate::ledger::{format_money, Ledger};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    AOwesB,
    BOwesA,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub direction: Direction,
    /// Always >= 0
    pub amount: Decimal,
}

impl Settlement {
    /// Derive the single net payment that would zero both balances
    pub fn from_ledger(ledger: &Ledger) -> Self {
        let net = ledger.party_a.balance;

        if net > Decimal::ZERO {
            Settlement {
                direction: Direction::BOwesA,
                amount: net,
            }
        } else if net < Decimal::ZERO {
            Settlement {
                direction: Direction::AOwesB,
                amount: -net,
            }
        } else {
            Settlement {
                direction: Direction::Settled,
                amount: Decimal::ZERO,
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.direction == Direction::Settled
    }

    /// Who owes whom, using the ledger's current party names
    pub fn statement(&self, ledger: &Ledger) -> String {
        match self.direction {
            Direction::BOwesA => format!(
                "{} owes {}: {}",
                ledger.party_b.name,
                ledger.party_a.name,
                format_money(self.amount)
            ),
            Direction::AOwesB => format!(
                "{} owes {}: {}",
                ledger.party_a.name,
                ledger.party_b.name,
                format_money(self.amount)
            ),
            Direction::Settled => "All settled up!".to_string(),
        }
    }
}

pub fn settlement(ledger: &Ledger) -> Settlement {
    Settlement::from_ledger(ledger)
}
