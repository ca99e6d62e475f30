//! # Value Transfer Ledger
//!
//! The escrow engine never holds value itself: it asks the host ledger to
//! move it. This module defines that seam ([`ValueLedger`]) and ships an
//! in-memory implementation used by tests, the bench, and the node's
//! replay mode.
//!
//! ## Atomicity contract
//!
//! - `transfer` is all-or-nothing: on failure nothing was debited.
//! - `transfer_batch` moves several legs as one unit. Hosts that have a
//!   native multi-leg primitive should override it. The default is a saga:
//!   legs are applied in order and, if one fails, the already-applied legs
//!   are reversed newest-first before the error is returned.
//!
//! All arithmetic is checked. Wrapping arithmetic and money do not mix.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by a value ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The debited account does not hold enough value.
    #[error("insufficient balance: {account} has {available}, requested {requested}")]
    InsufficientBalance {
        account: Identity,
        available: u64,
        requested: u64,
    },

    /// A credit would overflow the recipient's balance.
    #[error("balance overflow crediting {credit} to {account} (current {current})")]
    Overflow {
        account: Identity,
        current: u64,
        credit: u64,
    },

    /// The account is frozen by the host and cannot send or receive.
    #[error("account {0} is frozen")]
    AccountFrozen(Identity),

    /// A saga leg failed and reversing the already-applied legs also failed.
    /// The ledger is inconsistent and needs operator attention.
    #[error("compensation failed after leg {failed_leg}: {reason}")]
    CompensationFailed { failed_leg: usize, reason: String },
}

// ---------------------------------------------------------------------------
// TransferLeg
// ---------------------------------------------------------------------------

/// One movement of value inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLeg {
    pub amount: u64,
    pub from: Identity,
    pub to: Identity,
}

impl TransferLeg {
    pub fn new(amount: u64, from: &Identity, to: &Identity) -> Self {
        Self {
            amount,
            from: from.clone(),
            to: to.clone(),
        }
    }

    /// The leg that undoes this one.
    pub fn reversed(&self) -> Self {
        Self {
            amount: self.amount,
            from: self.to.clone(),
            to: self.from.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ValueLedger
// ---------------------------------------------------------------------------

/// The host ledger's value-movement primitive.
pub trait ValueLedger: Send + Sync {
    /// Move `amount` from `from` to `to`. All-or-nothing.
    fn transfer(&self, amount: u64, from: &Identity, to: &Identity) -> Result<(), LedgerError>;

    /// Current balance of `account`. Zero for unknown accounts.
    fn balance_of(&self, account: &Identity) -> u64;

    /// Apply every leg or none of them.
    fn transfer_batch(&self, legs: &[TransferLeg]) -> Result<(), LedgerError> {
        for (i, leg) in legs.iter().enumerate() {
            if let Err(err) = self.transfer(leg.amount, &leg.from, &leg.to) {
                debug!(leg = i, error = %err, "batch leg failed, compensating");
                for (j, applied) in legs[..i].iter().enumerate().rev() {
                    let undo = applied.reversed();
                    if let Err(undo_err) = self.transfer(undo.amount, &undo.from, &undo.to) {
                        error!(leg = j, error = %undo_err, "compensating transfer failed");
                        return Err(LedgerError::CompensationFailed {
                            failed_leg: i,
                            reason: undo_err.to_string(),
                        });
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Identity, u64>,
    frozen: HashSet<Identity>,
}

impl LedgerState {
    fn check_open(&self, account: &Identity) -> Result<(), LedgerError> {
        if self.frozen.contains(account) {
            return Err(LedgerError::AccountFrozen(account.clone()));
        }
        Ok(())
    }

    /// Compute the post-transfer balances without touching `self`.
    fn plan(
        &self,
        leg: &TransferLeg,
        overlay: &HashMap<Identity, u64>,
    ) -> Result<(u64, u64), LedgerError> {
        self.check_open(&leg.from)?;
        self.check_open(&leg.to)?;

        let read = |who: &Identity| {
            overlay
                .get(who)
                .or_else(|| self.balances.get(who))
                .copied()
                .unwrap_or(0)
        };

        let available = read(&leg.from);
        let from_after =
            available
                .checked_sub(leg.amount)
                .ok_or_else(|| LedgerError::InsufficientBalance {
                    account: leg.from.clone(),
                    available,
                    requested: leg.amount,
                })?;

        // Self-transfers are a no-op once the debit is known to be covered.
        if leg.from == leg.to {
            return Ok((available, available));
        }

        let current = read(&leg.to);
        let to_after = current
            .checked_add(leg.amount)
            .ok_or_else(|| LedgerError::Overflow {
                account: leg.to.clone(),
                current,
                credit: leg.amount,
            })?;

        Ok((from_after, to_after))
    }
}

/// A thread-safe in-memory ledger.
///
/// `transfer_batch` is natively atomic here: every leg is planned against a
/// scratch overlay under the write lock and only committed if all succeed.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account with `amount`. Returns the new balance.
    pub fn deposit(&self, account: &Identity, amount: u64) -> Result<u64, LedgerError> {
        let mut state = self.state.write();
        let current = state.balances.get(account).copied().unwrap_or(0);
        let next = current.checked_add(amount).ok_or_else(|| LedgerError::Overflow {
            account: account.clone(),
            current,
            credit: amount,
        })?;
        state.balances.insert(account.clone(), next);
        Ok(next)
    }

    /// Freeze an account: every transfer touching it fails.
    pub fn freeze_account(&self, account: &Identity) {
        self.state.write().frozen.insert(account.clone());
    }

    pub fn unfreeze_account(&self, account: &Identity) {
        self.state.write().frozen.remove(account);
    }

    /// Snapshot of every non-zero balance, sorted by identity.
    pub fn balances(&self) -> Vec<(Identity, u64)> {
        let state = self.state.read();
        let mut out: Vec<_> = state
            .balances
            .iter()
            .filter(|(_, v)| **v > 0)
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        out.sort();
        out
    }
}

impl ValueLedger for InMemoryLedger {
    fn transfer(&self, amount: u64, from: &Identity, to: &Identity) -> Result<(), LedgerError> {
        self.transfer_batch(&[TransferLeg::new(amount, from, to)])
    }

    fn balance_of(&self, account: &Identity) -> u64 {
        self.state.read().balances.get(account).copied().unwrap_or(0)
    }

    fn transfer_batch(&self, legs: &[TransferLeg]) -> Result<(), LedgerError> {
        let mut state = self.state.write();
        let mut overlay: HashMap<Identity, u64> = HashMap::new();

        for leg in legs {
            let (from_after, to_after) = state.plan(leg, &overlay)?;
            overlay.insert(leg.from.clone(), from_after);
            overlay.insert(leg.to.clone(), to_after);
        }

        state.balances.extend(overlay);
        Ok(())
    }
}
