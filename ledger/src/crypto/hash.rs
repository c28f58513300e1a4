//! Hash functions used across the ledger.
//!
//! Two functions, two jobs:
//!
//! - **double SHA-256** for transaction ids. The double construction
//!   protects against length extension, and a SHA-256-shaped id is what
//!   everyone downstream of Bitcoin expects a transaction hash to look like.
//! - **BLAKE3** for address derivation. Internal to Drift, no
//!   compatibility constraints, so the faster hash wins.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data` as a fixed-size array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Compute `SHA-256(SHA-256(data))`.
///
/// Used for transaction ids. The inner digest is re-hashed so that a
/// partial preimage can never be extended into a colliding id.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute the BLAKE3 digest of `data`.
///
/// Used to derive account addresses from public keys. BLAKE3 already
/// resists length extension, so no double-hashing is needed here.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256 of the empty string, the canonical test vector.
        let digest = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(digest.as_slice(), expected.as_slice());
    }

    #[test]
    fn double_sha256_is_sha256_of_sha256() {
        let single = sha256(b"drift");
        let double = double_sha256(b"drift");
        assert_eq!(double, sha256(&single));
        assert_ne!(double, single);
    }

    #[test]
    fn blake3_deterministic_and_input_sensitive() {
        assert_eq!(blake3_hash(b"drift"), blake3_hash(b"drift"));
        assert_ne!(blake3_hash(b"drift"), blake3_hash(b"Drift"));
    }
}
