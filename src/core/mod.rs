//! Core hosting-environment components
//!
//! This module contains the pieces every wallet runs on top of:
//! - Addresses (authenticated, opaque identities)
//! - The native value ledger

pub mod address;
pub mod ledger;

pub use address::Address;
pub use ledger::{Ledger, LedgerError, LedgerSnapshot};
