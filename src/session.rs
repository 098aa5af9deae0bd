// 👤 Session - who is acting, against which store
//
// Replaces ambient globals: the store, the configured names and the current
// user travel together in one value. Each mutation is load → apply → save.

use crate::db::LedgerStore;
use crate::error::{LedgerError, ValidationError};
use crate::ledger::{Ledger, PartyRole, Transaction};
use crate::rules::TransactionKind;
use crate::settings::Settings;
use crate::settlement::Settlement;
use anyhow::{anyhow, Result};
use chrono::{SubsecRound, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Balances plus the suggested settlement, ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub ledger: Ledger,
    pub settlement: Settlement,
}

impl Summary {
    pub fn statement(&self) -> String {
        self.settlement.statement(&self.ledger)
    }
}

pub struct Session<S: LedgerStore> {
    store: S,
    settings: Settings,
    user: Option<PartyRole>,
}

impl<S: LedgerStore> Session<S> {
    pub fn new(store: S, settings: Settings) -> Self {
        Session {
            store,
            settings,
            user: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    /// Resolve a configured name to a role and remember it as the current user
    pub fn login(&mut self, name: &str) -> Result<PartyRole, ValidationError> {
        let role = self.resolve(name)?;
        self.user = Some(role);
        tracing::info!(user = name.trim(), role = role.key(), "logged in");
        Ok(role)
    }

    pub fn logout(&mut self) {
        self.user = None;
    }

    pub fn user(&self) -> Option<PartyRole> {
        self.user
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user.map(|role| self.name_of(role))
    }

    pub fn name_of(&self, role: PartyRole) -> &str {
        match role {
            PartyRole::PersonA => &self.settings.person_a_name,
            PartyRole::PersonB => &self.settings.person_b_name,
        }
    }

    pub fn resolve(&self, name: &str) -> Result<PartyRole, ValidationError> {
        let name = name.trim();
        if name == self.settings.person_a_name {
            Ok(PartyRole::PersonA)
        } else if name == self.settings.person_b_name {
            Ok(PartyRole::PersonB)
        } else {
            tracing::warn!(name, "rejected unknown party name");
            Err(ValidationError::UnknownActor(name.to_string()))
        }
    }

    fn require_user(&self) -> Result<PartyRole> {
        self.user
            .ok_or_else(|| anyhow!("No user selected; log in as one of the two parties first"))
    }

    // ========================================================================
    // LEDGER ACCESS
    // ========================================================================

    /// Current ledger with party names taken from settings
    pub fn ledger(&mut self) -> Result<Ledger> {
        let mut ledger = self.store.load_or_init()?;
        ledger.set_names(&self.settings.person_a_name, &self.settings.person_b_name);
        Ok(ledger)
    }

    pub fn summary(&mut self) -> Result<Summary> {
        let ledger = self.ledger()?;
        let settlement = Settlement::from_ledger(&ledger);
        Ok(Summary { ledger, settlement })
    }

    /// Record a transaction as the current user and persist it
    pub fn add_transaction(
        &mut self,
        kind: TransactionKind,
        amount: Decimal,
        reason: &str,
    ) -> Result<Transaction> {
        let actor = self.require_user()?;
        let ledger = self.ledger()?;

        let next = ledger
            .apply(actor, kind, amount, reason, Utc::now().trunc_subsecs(0))
            .map_err(|err| {
                tracing::warn!(%err, "transaction rejected");
                err
            })?;
        self.store.save(&next)?;

        let tx = next
            .transactions
            .last()
            .cloned()
            .ok_or_else(|| anyhow!("Applied transaction missing from ledger"))?;

        tracing::info!(
            id = %tx.id,
            actor = actor.key(),
            kind = kind.tag(),
            amount = %tx.amount,
            "transaction recorded"
        );
        Ok(tx)
    }

    /// Reverse and remove a transaction by id. Any party may delete any record.
    pub fn delete_transaction(&mut self, id: Uuid) -> Result<Transaction> {
        let ledger = self.ledger()?;

        let (next, removed) = ledger.reverse_by_id(id).map_err(|err| {
            tracing::warn!(%err, "delete rejected");
            err
        })?;
        self.store.save(&next)?;

        tracing::info!(id = %removed.id, kind = removed.kind.tag(), "transaction deleted");
        Ok(removed)
    }
}

/// Pull a core error back out of an anyhow chain, for status mapping at the edges
pub fn ledger_error(err: &anyhow::Error) -> Option<&LedgerError> {
    err.downcast_ref::<LedgerError>()
}

pub fn validation_error(err: &anyhow::Error) -> Option<&ValidationError> {
    err.downcast_ref::<ValidationError>().or_else(|| match ledger_error(err) {
        Some(LedgerError::Validation(inner)) => Some(inner),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::settlement::Direction;
    use rust_decimal_macros::dec;

    fn session() -> Session<MemoryStore> {
        Session::new(MemoryStore::new(), Settings::default())
    }

    #[test]
    fn test_login_resolves_roles() {
        let mut session = session();
        assert_eq!(session.user(), None);

        assert_eq!(session.login("Bob"), Ok(PartyRole::PersonB));
        assert_eq!(session.user_name(), Some("Bob"));

        assert_eq!(
            session.login("Mallory"),
            Err(ValidationError::UnknownActor("Mallory".to_string()))
        );
        // Failed login keeps the previous user
        assert_eq!(session.user(), Some(PartyRole::PersonB));

        session.logout();
        assert_eq!(session.user(), None);
    }

    #[test]
    fn test_add_requires_login() {
        let mut session = session();
        let result = session.add_transaction(TransactionKind::SelfPaidSplit, dec!(10), "");
        assert!(result.is_err());
    }

    #[test]
    fn test_add_and_settle_round() {
        let mut session = session();

        session.login("Alice").unwrap();
        let tx = session
            .add_transaction(TransactionKind::SelfPaidSplit, dec!(20.00), " dinner ")
            .unwrap();
        assert_eq!(tx.actor, PartyRole::PersonA);
        assert_eq!(tx.reason, "dinner");

        let summary = session.summary().unwrap();
        assert_eq!(summary.settlement.direction, Direction::BOwesA);
        assert_eq!(summary.settlement.amount, dec!(10.00));
        assert_eq!(summary.statement(), "Bob owes Alice: $10.00");

        session.login("Bob").unwrap();
        session
            .add_transaction(TransactionKind::SelfSettled, dec!(10.00), "")
            .unwrap();

        let summary = session.summary().unwrap();
        assert!(summary.settlement.is_settled());
        assert_eq!(summary.ledger.transactions.len(), 2);
    }

    #[test]
    fn test_rejected_add_leaves_store_untouched() {
        let mut session = session();
        session.login("Alice").unwrap();
        session
            .add_transaction(TransactionKind::SelfPaidFull, dec!(5), "")
            .unwrap();

        let err = session
            .add_transaction(TransactionKind::SelfPaidFull, dec!(0), "")
            .unwrap_err();
        assert_eq!(
            validation_error(&err),
            Some(&ValidationError::NonPositiveAmount(dec!(0)))
        );

        let ledger = session.ledger().unwrap();
        assert_eq!(ledger.transactions.len(), 1);
        assert_eq!(ledger.party_a.balance, dec!(5));
    }

    #[test]
    fn test_delete_restores_balances() {
        let mut session = session();
        session.login("Alice").unwrap();
        let before = session.ledger().unwrap();

        let tx = session
            .add_transaction(TransactionKind::SelfPaidFull, dec!(50.00), "tickets")
            .unwrap();
        let removed = session.delete_transaction(tx.id).unwrap();

        assert_eq!(removed, tx);
        assert_eq!(session.ledger().unwrap(), before);
    }

    #[test]
    fn test_delete_unknown_id() {
        let mut session = session();
        let id = Uuid::new_v4();

        let err = session.delete_transaction(id).unwrap_err();
        assert_eq!(ledger_error(&err), Some(&LedgerError::NotFound(id)));
    }

    #[test]
    fn test_names_follow_settings() {
        let mut store = MemoryStore::new();
        store.save(&Ledger::new("Old A", "Old B")).unwrap();

        let mut session = Session::new(store, Settings::new("Sam", "Jo").unwrap());
        let ledger = session.ledger().unwrap();

        assert_eq!(ledger.party_a.name, "Sam");
        assert_eq!(ledger.party_b.name, "Jo");
    }

    #[test]
    fn test_timestamps_are_whole_seconds() {
        let mut session = session();
        session.login("Bob").unwrap();
        let tx = session
            .add_transaction(TransactionKind::OtherPaidSplit, dec!(3), "")
            .unwrap();

        assert_eq!(tx.timestamp.timestamp_subsec_nanos(), 0);
    }
}
