//! Multi-signature wallets
//!
//! A [`WalletRegistry`] creates wallets; each [`WalletEngine`] lets a fixed
//! set of signatories propose transactions, vote on them and execute them
//! once `required_approvals` signatories approve.
//!
//! # Example
//!
//! ```
//! use sigsafe::core::{Address, Ledger};
//! use sigsafe::multisig::{EventBus, RegistryConfig, WalletRegistry};
//! use std::sync::Arc;
//!
//! let registry = WalletRegistry::new(
//!     RegistryConfig::default(),
//!     Arc::new(Ledger::new()),
//!     Arc::new(EventBus::new()),
//! );
//! let (alice, bob, carol) = (Address::from("alice"), Address::from("bob"), Address::from("carol"));
//!
//! // 2-of-3 wallet
//! let handle = registry
//!     .create_wallet(&alice, 2, vec![alice.clone(), bob.clone(), carol.clone()])
//!     .unwrap();
//! let wallet = registry.wallet(&handle).unwrap();
//! registry.ledger().deposit(&handle, 100).unwrap();
//!
//! let id = wallet
//!     .initiate_transaction(&alice, carol.clone(), 40, vec![], b"rent".to_vec())
//!     .unwrap();
//! wallet.vote_for_transaction(&alice, id, true).unwrap();
//! wallet.vote_for_transaction(&bob, id, true).unwrap();
//! wallet.finalize_transaction(&bob, id).unwrap();
//!
//! assert_eq!(registry.ledger().balance_of(&carol), 40);
//! ```

pub mod call;
pub mod engine;
pub mod error;
pub mod events;
pub mod guard;
pub mod registry;
pub mod state;

pub use call::Call;
pub use engine::WalletEngine;
pub use error::{ExecutionError, WalletError};
pub use events::{EventBus, WalletEvent};
pub use registry::{RegistryConfig, RegistrySnapshot, WalletRecord, WalletRegistry};
pub use state::{Ballot, Quorum, Transaction, WalletInfo, WalletState};
