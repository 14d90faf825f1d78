//! Wallet collaborator boundary.
//!
//! Settlement credits winners through a [`WalletLedger`]. Every credit
//! carries a reference that is unique per contest entry; a ledger must
//! apply a given reference at most once, which keeps prize payment
//! exactly-once per winning entry across retries.

use std::collections::{HashMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ContestId, EntryId, UserId};
use crate::error::WalletError;

/// Outcome of a successful credit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Balance was credited now.
    Applied,
    /// The reference had already been applied; nothing changed.
    Duplicate,
}

/// Builds the idempotency reference for the prize of one contest entry.
///
/// Keyed on the entry rather than the rank, so an entry that moves into a
/// paid rank between two settlement runs is not mistaken for the entry
/// that held it before.
#[must_use]
pub fn settlement_reference(contest_id: ContestId, entry_id: EntryId) -> String {
    format!("settlement:{contest_id}:{entry_id}")
}

/// External wallet that receives prize credits.
#[async_trait]
pub trait WalletLedger: Send + Sync + fmt::Debug {
    /// Credits `amount` to `user_id` under the idempotency `reference`.
    ///
    /// # Errors
    ///
    /// Returns a [`WalletError`] if the credit is refused or the wallet
    /// cannot be reached.
    async fn credit(
        &self,
        user_id: UserId,
        amount: f64,
        reference: &str,
    ) -> Result<CreditOutcome, WalletError>;
}

#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<UserId, f64>,
    applied: HashSet<String>,
}

/// Process-local ledger used when no external wallet is wired in.
#[derive(Debug, Default)]
pub struct InMemoryWallet {
    ledger: Mutex<Ledger>,
}

impl InMemoryWallet {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the user's balance (zero for unknown users).
    pub async fn balance(&self, user_id: UserId) -> f64 {
        self.ledger
            .lock()
            .await
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or(0.0)
    }

    /// Returns the number of distinct references applied.
    pub async fn credits_applied(&self) -> usize {
        self.ledger.lock().await.applied.len()
    }
}

#[async_trait]
impl WalletLedger for InMemoryWallet {
    async fn credit(
        &self,
        user_id: UserId,
        amount: f64,
        reference: &str,
    ) -> Result<CreditOutcome, WalletError> {
        if !(amount.is_finite() && amount >= 0.0) {
            return Err(WalletError::Rejected(format!("invalid amount {amount}")));
        }
        let mut ledger = self.ledger.lock().await;
        if !ledger.applied.insert(reference.to_string()) {
            return Ok(CreditOutcome::Duplicate);
        }
        *ledger.balances.entry(user_id).or_insert(0.0) += amount;
        tracing::debug!(%user_id, amount, reference, "wallet credited");
        Ok(CreditOutcome::Applied)
    }
}
