//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing
//! - HASH160 digests for wallet and registry addresses

pub mod hash;

pub use hash::{hash160, hash160_parts, sha256, HASH160_LEN};
