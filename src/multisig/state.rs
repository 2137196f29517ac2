//! Wallet data model
//!
//! [`WalletState`] is everything one wallet stores: its signatory set,
//! quorum parameters, the append-only transaction log and the sparse
//! ballot table. It carries no behaviour beyond validation and the
//! count bookkeeping that voting relies on; see
//! [`WalletEngine`](crate::multisig::WalletEngine) for the state machine.

use crate::core::Address;
use crate::multisig::error::WalletError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One signatory's current vote on one transaction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Ballot {
    #[default]
    Unvoted = 0,
    Approved = 1,
    Rejected = 2,
}

impl Ballot {
    /// Ballot produced by a yes/no vote
    pub fn from_vote(approve: bool) -> Self {
        if approve {
            Ballot::Approved
        } else {
            Ballot::Rejected
        }
    }
}

/// Validated quorum parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quorum {
    /// Approvals needed to finalize
    pub required_approvals: u64,
    /// Rejections after which quorum can no longer be reached
    pub rejection_threshold: u64,
}

impl Quorum {
    /// Validate `required_approvals` against the signatory list
    ///
    /// Checks run in order: zero quorum, quorum above signatory count,
    /// duplicate signatories.
    pub fn new(required_approvals: u64, signatories: &[Address]) -> Result<Self, WalletError> {
        if required_approvals == 0 {
            return Err(WalletError::RequiredApprovalsCantBeZero);
        }

        let count = signatories.len() as u64;
        if required_approvals > count {
            return Err(WalletError::RequiredApprovalsCantExceedSignatories {
                required: required_approvals,
                signatories: signatories.len(),
            });
        }

        let mut seen = HashSet::with_capacity(signatories.len());
        for signatory in signatories {
            if !seen.insert(signatory) {
                return Err(WalletError::DuplicateSignatoryAddress(signatory.clone()));
            }
        }

        Ok(Self {
            required_approvals,
            rejection_threshold: count - required_approvals + 1,
        })
    }
}

/// A proposed action and its running tally
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: u64,
    pub initiated_at: DateTime<Utc>,
    /// Set once the transaction has executed
    pub executed_at: Option<DateTime<Utc>>,
    pub to: Address,
    pub value: u128,
    /// Encoded call to perform, empty for a plain value transfer
    #[serde(with = "hex::serde")]
    pub data: Vec<u8>,
    /// Free-form annotation, never interpreted
    #[serde(with = "hex::serde")]
    pub metadata: Vec<u8>,
    pub executed: bool,
    pub approval_count: u64,
    pub rejection_count: u64,
}

impl Transaction {
    fn new(transaction_id: u64, to: Address, value: u128, data: Vec<u8>, metadata: Vec<u8>) -> Self {
        Self {
            transaction_id,
            initiated_at: Utc::now(),
            executed_at: None,
            to,
            value,
            data,
            metadata,
            executed: false,
            approval_count: 0,
            rejection_count: 0,
        }
    }

    /// Whether enough signatories rejected that quorum is unreachable.
    /// Informational only; the engine keeps accepting votes.
    pub fn is_effectively_rejected(&self, rejection_threshold: u64) -> bool {
        self.rejection_count >= rejection_threshold
    }

    /// Metadata rendered as text when it is valid UTF-8
    pub fn metadata_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.metadata).ok()
    }
}

/// Summary returned by `getWallet`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub signatories: Vec<Address>,
    pub required_approvals: u64,
    pub rejection_threshold: u64,
    pub transaction_count: u64,
    pub address: Address,
}

/// Complete persistent state of one wallet
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletState {
    signatories: Vec<Address>,
    quorum: Quorum,
    transactions: Vec<Transaction>,
    /// transaction id -> signatory -> ballot; absent means unvoted
    ballots: HashMap<u64, HashMap<Address, Ballot>>,
}

impl WalletState {
    /// Validate parameters and build an empty wallet state
    pub fn new(required_approvals: u64, signatories: Vec<Address>) -> Result<Self, WalletError> {
        let quorum = Quorum::new(required_approvals, &signatories)?;
        Ok(Self {
            signatories,
            quorum,
            transactions: Vec::new(),
            ballots: HashMap::new(),
        })
    }

    pub fn signatories(&self) -> &[Address] {
        &self.signatories
    }

    pub fn quorum(&self) -> Quorum {
        self.quorum
    }

    pub fn is_signatory(&self, identity: &Address) -> bool {
        self.signatories.iter().any(|s| s == identity)
    }

    /// Number of proposals ever made; also the next transaction id
    pub fn transaction_count(&self) -> u64 {
        self.transactions.len() as u64
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transaction(&self, id: u64) -> Result<&Transaction, WalletError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.transactions.get(index))
            .ok_or(WalletError::TransactionDoesNotExist(id))
    }

    pub(crate) fn transaction_mut(&mut self, id: u64) -> Result<&mut Transaction, WalletError> {
        usize::try_from(id)
            .ok()
            .and_then(|index| self.transactions.get_mut(index))
            .ok_or(WalletError::TransactionDoesNotExist(id))
    }

    /// Transaction that still accepts votes and execution
    pub(crate) fn pending_transaction_mut(
        &mut self,
        id: u64,
    ) -> Result<&mut Transaction, WalletError> {
        let tx = self.transaction_mut(id)?;
        if tx.executed {
            return Err(WalletError::TransactionAlreadyExecuted(id));
        }
        Ok(tx)
    }

    /// Append a new proposal and return its id
    pub(crate) fn push_transaction(
        &mut self,
        to: Address,
        value: u128,
        data: Vec<u8>,
        metadata: Vec<u8>,
    ) -> u64 {
        let id = self.transaction_count();
        self.transactions
            .push(Transaction::new(id, to, value, data, metadata));
        id
    }

    pub fn ballot(&self, id: u64, signatory: &Address) -> Ballot {
        self.ballots
            .get(&id)
            .and_then(|votes| votes.get(signatory))
            .copied()
            .unwrap_or_default()
    }

    /// Replace a signatory's ballot, moving its contribution between the
    /// approval and rejection tallies. Returns the previous ballot.
    ///
    /// Callers must have checked that the transaction exists and is
    /// still pending.
    pub(crate) fn set_ballot(
        &mut self,
        id: u64,
        signatory: &Address,
        ballot: Ballot,
    ) -> Result<Ballot, WalletError> {
        let previous = self.ballot(id, signatory);
        let tx = self.pending_transaction_mut(id)?;

        match previous {
            Ballot::Approved => tx.approval_count -= 1,
            Ballot::Rejected => tx.rejection_count -= 1,
            Ballot::Unvoted => {}
        }
        match ballot {
            Ballot::Approved => tx.approval_count += 1,
            Ballot::Rejected => tx.rejection_count += 1,
            Ballot::Unvoted => {}
        }

        let votes = self.ballots.entry(id).or_default();
        if ballot == Ballot::Unvoted {
            votes.remove(signatory);
        } else {
            votes.insert(signatory.clone(), ballot);
        }

        Ok(previous)
    }

    pub fn info(&self, address: &Address) -> WalletInfo {
        WalletInfo {
            signatories: self.signatories.clone(),
            required_approvals: self.quorum.required_approvals,
            rejection_threshold: self.quorum.rejection_threshold,
            transaction_count: self.transaction_count(),
            address: address.clone(),
        }
    }
}
