//! Native value ledger
//!
//! Holds the balance every address owns. Wallets pay out of this table
//! when a finalized transaction carries a non-zero value.

use crate::core::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient funds in {address}: have {have}, need {need}")]
    InsufficientFunds {
        address: Address,
        have: u128,
        need: u128,
    },
    #[error("Balance overflow for {0}")]
    Overflow(Address),
}

/// Shared balance table
#[derive(Debug, Default)]
pub struct Ledger {
    balances: Mutex<HashMap<Address, u128>>,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted balances
    pub fn from_balances(balances: HashMap<Address, u128>) -> Self {
        Self {
            balances: Mutex::new(balances),
        }
    }

    fn balances(&self) -> MutexGuard<'_, HashMap<Address, u128>> {
        self.balances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the balance of an address (0 if never funded)
    pub fn balance_of(&self, address: &Address) -> u128 {
        self.balances().get(address).copied().unwrap_or(0)
    }

    /// Credit an address
    pub fn deposit(&self, address: &Address, amount: u128) -> Result<u128, LedgerError> {
        let mut balances = self.balances();
        let current = balances.get(address).copied().unwrap_or(0);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(address.clone()))?;
        balances.insert(address.clone(), updated);

        log::debug!("Deposited {} to {} (balance {})", amount, address, updated);
        Ok(updated)
    }

    /// Move value from one address to another
    ///
    /// Either both balances change or neither does.
    pub fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }

        let mut balances = self.balances();
        let from_balance = balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(LedgerError::InsufficientFunds {
                address: from.clone(),
                have: from_balance,
                need: amount,
            });
        }

        if from == to {
            return Ok(());
        }

        let to_balance = balances.get(to).copied().unwrap_or(0);
        let credited = to_balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(to.clone()))?;

        balances.insert(from.clone(), from_balance - amount);
        balances.insert(to.clone(), credited);

        Ok(())
    }

    /// Copy of all non-zero balances
    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            balances: self
                .balances()
                .iter()
                .filter(|(_, &b)| b > 0)
                .map(|(a, b)| (a.clone(), *b))
                .collect(),
        }
    }
}

/// Serializable ledger contents
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LedgerSnapshot {
    pub balances: HashMap<Address, u128>,
}

impl From<LedgerSnapshot> for Ledger {
    fn from(snapshot: LedgerSnapshot) -> Self {
        Ledger::from_balances(snapshot.balances)
    }
}
