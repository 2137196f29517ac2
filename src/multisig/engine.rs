//! Wallet authorization state machine
//!
//! A [`WalletEngine`] owns one [`WalletState`] and is the only thing that
//! mutates it. Transactions move `Proposed -> (Voting)* -> Finalized`;
//! voting is a self-loop that stays open until the transaction executes.
//!
//! Every mutating call:
//! 1. checks the caller is a signatory,
//! 2. enters the wallet's [`CallGuard`], which serializes callers and
//!    rejects reentry from the finalize external action,
//! 3. applies its change under one state lock acquisition.
//!
//! Finalize first takes the registry's execution lock, then the guard. It
//! reads the transaction under the state lock, releases the lock, runs the
//! external action through the registry and marks the transaction executed
//! only after the action succeeded.

use crate::core::Address;
use crate::multisig::error::{ExecutionError, WalletError};
use crate::multisig::events::{EventBus, WalletEvent};
use crate::multisig::guard::{CallGuard, CallScope};
use crate::multisig::registry::WalletRegistry;
use crate::multisig::state::{Ballot, Transaction, WalletInfo, WalletState};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// A live wallet instance
///
/// Only [`WalletRegistry::create_wallet`] constructs wallets.
#[derive(Debug)]
pub struct WalletEngine {
    address: Address,
    state: Mutex<WalletState>,
    guard: CallGuard,
    /// Capability used to perform external actions; the registry outlives
    /// the wallets it creates
    registry: Weak<WalletRegistry>,
    events: Arc<EventBus>,
}

impl WalletEngine {
    pub(crate) fn new(
        address: Address,
        state: WalletState,
        registry: Weak<WalletRegistry>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            address,
            state: Mutex::new(state),
            guard: CallGuard::new(),
            registry,
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_signatory(&self, caller: &Address) -> Result<(), WalletError> {
        if self.state().is_signatory(caller) {
            Ok(())
        } else {
            Err(WalletError::NotASignatoryForThisWallet(caller.clone()))
        }
    }

    fn enter(&self, caller: &Address) -> Result<CallScope<'_>, WalletError> {
        self.guard.enter().map_err(|_| {
            log::warn!("Rejected reentrant call by {} on wallet {}", caller, self.address);
            WalletError::ReentrantCall(self.address.clone())
        })
    }

    /// Authorization check followed by guard entry
    fn begin(&self, caller: &Address) -> Result<CallScope<'_>, WalletError> {
        self.check_signatory(caller)?;
        self.enter(caller)
    }

    // =========================================================================
    // Mutating operations
    // =========================================================================

    /// Propose a new transaction and return its id
    ///
    /// No validation is applied to `to`, `value` or `data`; a zero-value
    /// proposal to the zero address is a valid record-keeping entry.
    pub fn initiate_transaction(
        &self,
        caller: &Address,
        to: Address,
        value: u128,
        data: Vec<u8>,
        metadata: Vec<u8>,
    ) -> Result<u64, WalletError> {
        let _call = self.begin(caller)?;

        let id = self.state().push_transaction(to, value, data, metadata);

        log::info!(
            "Transaction {} initiated on {} by {}",
            id,
            self.address,
            caller
        );
        self.events.emit(WalletEvent::TransactionInitiated {
            by: caller.clone(),
            wallet: self.address.clone(),
            transaction_id: id,
            timestamp: Utc::now(),
        });

        Ok(id)
    }

    /// Approve or reject a pending transaction
    ///
    /// Repeating the same vote leaves the tallies unchanged; switching sides
    /// moves the caller's contribution from one tally to the other.
    pub fn vote_for_transaction(
        &self,
        caller: &Address,
        transaction_id: u64,
        approve: bool,
    ) -> Result<(), WalletError> {
        let _call = self.begin(caller)?;

        let previous =
            self.state()
                .set_ballot(transaction_id, caller, Ballot::from_vote(approve))?;

        log::debug!(
            "{} voted {} on {}#{} (was {:?})",
            caller,
            if approve { "approve" } else { "reject" },
            self.address,
            transaction_id,
            previous
        );
        self.events.emit(WalletEvent::VoteCast {
            by: caller.clone(),
            wallet: self.address.clone(),
            transaction_id,
            approve,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Withdraw the caller's vote on a pending transaction
    pub fn reset_vote(&self, caller: &Address, transaction_id: u64) -> Result<(), WalletError> {
        let _call = self.begin(caller)?;

        {
            let mut state = self.state();
            state.pending_transaction_mut(transaction_id)?;
            if state.ballot(transaction_id, caller) == Ballot::Unvoted {
                return Err(WalletError::NoVotesToReset(transaction_id));
            }
            state.set_ballot(transaction_id, caller, Ballot::Unvoted)?;
        }

        log::debug!(
            "{} reset vote on {}#{}",
            caller,
            self.address,
            transaction_id
        );
        self.events.emit(WalletEvent::VoteReset {
            by: caller.clone(),
            wallet: self.address.clone(),
            transaction_id,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    /// Execute a transaction that has reached quorum
    ///
    /// Executes at most once. The registry's execution lock is taken before
    /// the wallet guard and held until the end, and `executed` is only set
    /// once the external action has succeeded. If the action fails the
    /// transaction is untouched and `TransactionExecutionToAddressFailed`
    /// is returned.
    pub fn finalize_transaction(
        &self,
        caller: &Address,
        transaction_id: u64,
    ) -> Result<(), WalletError> {
        self.check_signatory(caller)?;
        let registry = self.registry.upgrade();
        let _execution = registry.as_ref().map(|r| r.execution_lock().acquire());
        let _call = self.enter(caller)?;

        let (to, value, data) = {
            let mut state = self.state();
            let required = state.quorum().required_approvals;
            let tx = state.pending_transaction_mut(transaction_id)?;
            if tx.approval_count < required {
                return Err(WalletError::MinimumApprovalsForTransactionNotMet {
                    have: tx.approval_count,
                    need: required,
                });
            }
            (tx.to.clone(), tx.value, tx.data.clone())
        };

        let result = match &registry {
            Some(registry) => registry.execute_action(&self.address, &to, value, &data),
            None => Err(ExecutionError::RegistryUnavailable),
        };
        if let Err(source) = result {
            log::warn!(
                "Execution of {}#{} to {} failed: {}",
                self.address,
                transaction_id,
                to,
                source
            );
            return Err(WalletError::TransactionExecutionToAddressFailed {
                to,
                source: Box::new(source),
            });
        }

        // Guard still held: nothing changed the transaction meanwhile
        {
            let mut state = self.state();
            let tx = state.transaction_mut(transaction_id)?;
            tx.executed = true;
            tx.executed_at = Some(Utc::now());
        }

        log::info!(
            "Transaction {} executed on {} by {} ({} to {})",
            transaction_id,
            self.address,
            caller,
            value,
            to
        );
        self.events.emit(WalletEvent::TransactionExecuted {
            by: caller.clone(),
            wallet: self.address.clone(),
            to,
            transaction_id,
            value,
            timestamp: Utc::now(),
        });

        Ok(())
    }

    // =========================================================================
    // Read-only accessors
    // =========================================================================

    /// The wallet's own handle
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn get_wallet(&self) -> WalletInfo {
        self.state().info(&self.address)
    }

    pub fn get_transaction(&self, transaction_id: u64) -> Result<Transaction, WalletError> {
        self.state().transaction(transaction_id).cloned()
    }

    /// All transactions in id order
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state().transactions().to_vec()
    }

    pub fn is_signatory(&self, identity: &Address) -> bool {
        self.state().is_signatory(identity)
    }

    pub fn signatory_votes(&self, transaction_id: u64, identity: &Address) -> Ballot {
        self.state().ballot(transaction_id, identity)
    }

    /// Copy of the persistent state
    pub fn snapshot(&self) -> WalletState {
        self.state().clone()
    }
}
