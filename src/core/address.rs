//! Account identities
//!
//! An [`Address`] is an opaque identity that the hosting environment has
//! already authenticated. Signatories, wallets, the registry and plain
//! value recipients all share the same address space.

use crate::crypto::hash160_parts;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An authenticated account identity (`0x`-prefixed hex by convention)
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap an identity string as-is
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The all-zero address, used as the target of record-keeping proposals
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(40)))
    }

    /// Derive a contract-style address from framed seed parts
    ///
    /// Address = "0x" || hex(RIPEMD160(SHA256(parts)))
    pub fn derive(parts: &[&[u8]]) -> Self {
        Self(format!("0x{}", hex::encode(hash160_parts(parts))))
    }

    /// Check for the all-zero address
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_address() {
        let zero = Address::zero();
        assert_eq!(zero.as_str().len(), 42);
        assert!(zero.is_zero());
        assert!(!Address::from("0xabc").is_zero());
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = Address::derive(&[b"sigsafe", b"alice", &0u64.to_be_bytes()]);
        let b = Address::derive(&[b"sigsafe", b"alice", &0u64.to_be_bytes()]);
        let c = Address::derive(&[b"sigsafe", b"alice", &1u64.to_be_bytes()]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.as_str().starts_with("0x"));
        assert_eq!(a.as_str().len(), 42);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let address = Address::from("0xfeed");
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"0xfeed\"");

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
