//! Multisig error taxonomy

use crate::core::{Address, LedgerError};
use thiserror::Error;

/// Errors raised by the registry and by wallet operations
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Required approvals can't be zero")]
    RequiredApprovalsCantBeZero,
    #[error("Required approvals ({required}) can't exceed signatory count ({signatories})")]
    RequiredApprovalsCantExceedSignatories { required: u64, signatories: usize },
    #[error("Duplicate signatory address: {0}")]
    DuplicateSignatoryAddress(Address),
    #[error("{0} is not a signatory for this wallet")]
    NotASignatoryForThisWallet(Address),
    #[error("Transaction {0} does not exist")]
    TransactionDoesNotExist(u64),
    #[error("Transaction {0} already executed")]
    TransactionAlreadyExecuted(u64),
    #[error("Minimum approvals not met: have {have}, need {need}")]
    MinimumApprovalsForTransactionNotMet { have: u64, need: u64 },
    #[error("No vote to reset on transaction {0}")]
    NoVotesToReset(u64),
    #[error("Transaction execution to {to} failed: {source}")]
    TransactionExecutionToAddressFailed {
        to: Address,
        #[source]
        source: Box<ExecutionError>,
    },
    #[error("Reentrant call rejected on wallet {0}")]
    ReentrantCall(Address),
    #[error("Wallet not found: {0}")]
    WalletNotFound(Address),
}

impl WalletError {
    /// Stable error name, suitable for client-side translation
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::RequiredApprovalsCantBeZero => "RequiredApprovalsCantBeZero",
            WalletError::RequiredApprovalsCantExceedSignatories { .. } => {
                "RequiredApprovalsCantExceedSignatories"
            }
            WalletError::DuplicateSignatoryAddress(_) => "DuplicateSignatoryAddress",
            WalletError::NotASignatoryForThisWallet(_) => "NotASignatoryForThisWallet",
            WalletError::TransactionDoesNotExist(_) => "TransactionDoesNotExist",
            WalletError::TransactionAlreadyExecuted(_) => "TransactionAlreadyExecuted",
            WalletError::MinimumApprovalsForTransactionNotMet { .. } => {
                "MinimumApprovalsForTransactionNotMet"
            }
            WalletError::NoVotesToReset(_) => "NoVotesToReset",
            WalletError::TransactionExecutionToAddressFailed { .. } => {
                "TransactionExecutionToAddressFailed"
            }
            WalletError::ReentrantCall(_) => "ReentrancyGuardReentrantCall",
            WalletError::WalletNotFound(_) => "WalletNotFound",
        }
    }

    /// True for errors detected while validating creation parameters
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            WalletError::RequiredApprovalsCantBeZero
                | WalletError::RequiredApprovalsCantExceedSignatories { .. }
                | WalletError::DuplicateSignatoryAddress(_)
        )
    }
}

/// Why the external action of a finalized transaction failed
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Undecodable call payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("No callable target at {0}")]
    NoCallTarget(Address),
    #[error("Call `{method}` is not supported by {target}")]
    UnsupportedCall { target: Address, method: &'static str },
    #[error("Nested call failed: {0}")]
    Nested(#[from] WalletError),
    #[error("Registry is no longer available")]
    RegistryUnavailable,
    /// The call failed and its value transfer could not be undone
    #[error("{call}; reversing the transfer failed: {reversal}")]
    ReversalFailed {
        call: Box<ExecutionError>,
        reversal: LedgerError,
    },
}
