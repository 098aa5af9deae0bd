// 📒 Ledger - Two parties, one zero-sum balance sheet
//
// Every mutation goes through apply (append) or reverse (remove).
// Both keep party_a.balance + party_b.balance == 0.

use crate::error::{LedgerError, ValidationError};
use crate::rules::TransactionKind;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_PERSON_A: &str = "Alice";
pub const DEFAULT_PERSON_B: &str = "Bob";

/// Largest accepted amount (1,000,000,000.00). Keeps balances far from `Decimal::MAX`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

// ============================================================================
// PARTIES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    PersonA,
    PersonB,
}

impl PartyRole {
    pub fn counterparty(self) -> PartyRole {
        match self {
            PartyRole::PersonA => PartyRole::PersonB,
            PartyRole::PersonB => PartyRole::PersonA,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            PartyRole::PersonA => "person_a",
            PartyRole::PersonB => "person_b",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    /// Positive: the counterparty owes this party
    pub balance: Decimal,
}

impl Party {
    pub fn new(name: &str) -> Self {
        Party {
            name: name.to_string(),
            balance: Decimal::ZERO,
        }
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// An immutable ledger entry. Identity is the `id`, never the field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub actor: PartyRole,
    pub kind: TransactionKind,
    pub amount: Decimal,
    #[serde(default)]
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Build a validated record: amount rounded to cents, reason trimmed, fresh id
    pub fn new(
        actor: PartyRole,
        kind: TransactionKind,
        amount: Decimal,
        reason: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        Ok(Transaction {
            id: Uuid::new_v4(),
            actor,
            kind,
            amount: round_amount(amount)?,
            reason: reason.trim().to_string(),
            timestamp,
        })
    }

    /// One-line description, e.g. `Alice - You Paid - Split 50/50 - $20.00 for dinner (...)`
    pub fn describe(&self, ledger: &Ledger) -> String {
        let mut line = format!(
            "{} - {} - {}",
            ledger.party(self.actor).name,
            self.kind.label(),
            format_money(self.amount)
        );
        if !self.reason.is_empty() {
            line.push_str(&format!(" for {}", self.reason));
        }
        line.push_str(&format!(" ({})", format_timestamp(&self.timestamp)));
        line
    }
}

/// Validate and round an amount to cent precision
pub fn round_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount(amount));
    }

    if amount > MAX_AMOUNT {
        return Err(ValidationError::AmountTooLarge {
            amount,
            max: MAX_AMOUNT,
        });
    }

    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        return Err(ValidationError::RoundsToZero(amount));
    }

    Ok(rounded)
}

/// Parse user input such as `20`, `20.5` or `$20.50`
pub fn parse_amount(input: &str) -> Result<Decimal, ValidationError> {
    let cleaned = input.trim().trim_start_matches('$').replace(',', "");
    let amount = Decimal::from_str(&cleaned)
        .map_err(|_| ValidationError::MalformedAmount(input.to_string()))?;
    round_amount(amount)
}

/// Render money at cent precision: `$12.50`, `-$3.00`
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-${:.2}", rounded.abs())
    } else {
        format!("${:.2}", rounded.abs())
    }
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()
}

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    pub party_a: Party,
    pub party_b: Party,
    /// Insertion order is chronological order
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Default for Ledger {
    fn default() -> Self {
        Ledger::new(DEFAULT_PERSON_A, DEFAULT_PERSON_B)
    }
}

impl Ledger {
    /// Zero balances, no transactions
    pub fn new(person_a: &str, person_b: &str) -> Self {
        Ledger {
            party_a: Party::new(person_a),
            party_b: Party::new(person_b),
            transactions: Vec::new(),
        }
    }

    pub fn party(&self, role: PartyRole) -> &Party {
        match role {
            PartyRole::PersonA => &self.party_a,
            PartyRole::PersonB => &self.party_b,
        }
    }

    fn party_mut(&mut self, role: PartyRole) -> &mut Party {
        match role {
            PartyRole::PersonA => &mut self.party_a,
            PartyRole::PersonB => &mut self.party_b,
        }
    }

    /// Names are not part of ledger identity; configuration wins on every load
    pub fn set_names(&mut self, person_a: &str, person_b: &str) {
        self.party_a.name = person_a.to_string();
        self.party_b.name = person_b.to_string();
    }

    pub fn is_balanced(&self) -> bool {
        (self.party_a.balance + self.party_b.balance).is_zero()
    }

    pub fn find(&self, id: Uuid) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.id == id)
    }

    /// Last `limit` transactions, newest first
    pub fn recent(&self, limit: usize) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().rev().take(limit)
    }

    /// Move `delta` onto the actor's balance and off the counterparty's.
    /// Both sums are checked before either balance is written.
    fn shift(&mut self, actor: PartyRole, delta: Decimal) -> Result<(), ValidationError> {
        let overflow = || ValidationError::BalanceOverflow(delta);
        let credited = self
            .party(actor)
            .balance
            .checked_add(delta)
            .ok_or_else(overflow)?;
        let debited = self
            .party(actor.counterparty())
            .balance
            .checked_sub(delta)
            .ok_or_else(overflow)?;

        self.party_mut(actor).balance = credited;
        self.party_mut(actor.counterparty()).balance = debited;
        Ok(())
    }

    // ========================================================================
    // APPLIER
    // ========================================================================

    /// Record a new transaction and return the updated ledger.
    /// `self` is left untouched, so a rejected input never changes state.
    pub fn apply(
        &self,
        actor: PartyRole,
        kind: TransactionKind,
        amount: Decimal,
        reason: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Ledger, LedgerError> {
        let tx = Transaction::new(actor, kind, amount, reason, timestamp)?;
        self.apply_record(tx)
    }

    /// Apply an already-built record. Balance deltas use the stored (rounded) amount.
    pub fn apply_record(&self, tx: Transaction) -> Result<Ledger, LedgerError> {
        if tx.amount <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveAmount(tx.amount).into());
        }
        if tx.amount > MAX_AMOUNT {
            return Err(ValidationError::AmountTooLarge {
                amount: tx.amount,
                max: MAX_AMOUNT,
            }
            .into());
        }

        let mut next = self.clone();
        next.shift(tx.actor, tx.kind.actor_delta(tx.amount))?;
        next.transactions.push(tx);
        Ok(next)
    }

    // ========================================================================
    // REVERSER
    // ========================================================================

    /// Undo a recorded transaction and drop it from the sequence.
    /// The stored copy (matched by id) drives the arithmetic.
    pub fn reverse(&self, tx: &Transaction) -> Result<Ledger, LedgerError> {
        self.reverse_by_id(tx.id).map(|(ledger, _)| ledger)
    }

    pub fn reverse_by_id(&self, id: Uuid) -> Result<(Ledger, Transaction), LedgerError> {
        let position = self
            .transactions
            .iter()
            .position(|tx| tx.id == id)
            .ok_or(LedgerError::NotFound(id))?;

        let mut next = self.clone();
        let removed = next.transactions.remove(position);
        next.shift(removed.actor, -removed.kind.actor_delta(removed.amount))?;
        Ok((next, removed))
    }
}

// ============================================================================
// TESTS
// ============================================================================
