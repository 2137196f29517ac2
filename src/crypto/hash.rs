//! Hashing utilities used for address derivation
//!
//! Wallet handles and the registry address are HASH160 digests
//! (RIPEMD160 over SHA-256), the same construction P2SH-style
//! addresses use.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Length in bytes of a HASH160 digest
pub const HASH160_LEN: usize = 20;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; HASH160_LEN] {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(data));
    ripemd.finalize().into()
}

/// HASH160 of a sequence of parts, each length-prefixed so that
/// `["ab", "c"]` and `["a", "bc"]` never collide.
pub fn hash160_parts(parts: &[&[u8]]) -> [u8; HASH160_LEN] {
    let mut data = Vec::new();
    for part in parts {
        data.extend_from_slice(&(part.len() as u64).to_be_bytes());
        data.extend_from_slice(part);
    }
    hash160(&data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            hex::encode(hash),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_hash160_length_and_determinism() {
        let a = hash160(b"registry");
        let b = hash160(b"registry");
        assert_eq!(a.len(), HASH160_LEN);
        assert_eq!(a, b);
        assert_ne!(a, hash160(b"registry2"));
    }

    #[test]
    fn test_hash160_parts_are_framed() {
        let joined = hash160_parts(&[b"ab", b"c"]);
        let shifted = hash160_parts(&[b"a", b"bc"]);
        assert_ne!(joined, shifted);
    }
}
