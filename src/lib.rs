//! sigsafe: a multi-signature wallet registry in Rust
//!
//! This crate provides:
//! - A registry that creates M-of-N wallets and tracks who created them
//! - Proposal, voting, vote withdrawal and one-shot execution per wallet
//! - A value ledger and call dispatch for executed transactions
//! - Reentrancy protection and serialized mutations per wallet
//! - Wallet event notifications
//! - JSON persistence with backups, a CLI and a REST/WebSocket API
//!
//! # Example
//!
//! ```rust
//! use sigsafe::core::{Address, Ledger};
//! use sigsafe::multisig::{Ballot, EventBus, RegistryConfig, WalletRegistry};
//! use std::sync::Arc;
//!
//! let registry = WalletRegistry::new(
//!     RegistryConfig::default(),
//!     Arc::new(Ledger::new()),
//!     Arc::new(EventBus::new()),
//! );
//!
//! let owner = Address::from("owner");
//! let handle = registry.create_wallet(&owner, 1, vec![owner.clone()]).unwrap();
//! let wallet = registry.wallet(&handle).unwrap();
//!
//! let id = wallet
//!     .initiate_transaction(&owner, Address::zero(), 0, vec![], vec![])
//!     .unwrap();
//! wallet.vote_for_transaction(&owner, id, true).unwrap();
//! assert_eq!(wallet.signatory_votes(id, &owner), Ballot::Approved);
//!
//! wallet.finalize_transaction(&owner, id).unwrap();
//! assert!(wallet.get_transaction(id).unwrap().executed);
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use core::{Address, Ledger};
pub use multisig::{
    Ballot, Call, EventBus, RegistryConfig, Transaction, WalletEngine, WalletError, WalletEvent,
    WalletRegistry,
};
pub use storage::{Storage, StorageConfig};
