//! # Identity -- Wallets and Addresses
//!
//! An account address is derived from an Ed25519 public key:
//!
//! ```text
//! public_key (32 bytes)
//!     -> BLAKE3(public_key) -> 32 bytes
//!     -> Bech32("drift", hash) -> drift1qw508d6qe...
//! ```
//!
//! The `drift` human-readable prefix makes addresses recognizable at a
//! glance, and Bech32's checksum catches transcription errors. Hashing the
//! key (rather than encoding it directly) gives a fixed-width identity
//! that would survive a future key-scheme change.
//!
//! A [`Wallet`] is just a keypair plus its derived address -- the minimal
//! identity a node needs to sign transfers.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config;
use crate::crypto::hash::blake3_hash;
use crate::crypto::keys::{Keypair, PublicKey};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from parsing an address string.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The Bech32 string could not be decoded.
    #[error("bech32 decode error: {0}")]
    Bech32Decode(String),

    /// The decoded address has an unexpected human-readable prefix.
    #[error("invalid HRP: expected '{expected}', got '{got}'")]
    InvalidHrp {
        /// The expected HRP.
        expected: String,
        /// The HRP that was actually found.
        got: String,
    },

    /// The decoded data has an unexpected length.
    #[error("invalid address data length: expected {expected} bytes, got {got}")]
    InvalidDataLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An account identity: the BLAKE3 hash of a public key.
///
/// Equality is by value, which makes an `Address` usable as a map key
/// across process boundaries. `Copy` because it is a bare 32-byte array
/// and gets passed around constantly on the apply path.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    hash: [u8; 32],
}

impl Address {
    /// Derive the address of a public key.
    pub fn from_public_key(pk: &PublicKey) -> Self {
        Self {
            hash: blake3_hash(pk.as_bytes()),
        }
    }

    /// Encode as a Bech32 string of the form `drift1...`.
    pub fn to_bech32(&self) -> String {
        let hrp = Hrp::parse(config::ADDRESS_HRP).expect("static HRP is valid");
        bech32::encode::<Bech32>(hrp, &self.hash)
            .expect("encoding a 32-byte payload should never fail")
    }

    /// Parse a Bech32-encoded address, validating HRP, checksum, and length.
    pub fn from_bech32(addr: &str) -> Result<Self, AddressError> {
        let (hrp, data) =
            bech32::decode(addr).map_err(|e| AddressError::Bech32Decode(e.to_string()))?;

        let expected_hrp = Hrp::parse(config::ADDRESS_HRP).expect("static HRP is valid");
        if hrp != expected_hrp {
            return Err(AddressError::InvalidHrp {
                expected: config::ADDRESS_HRP.to_string(),
                got: hrp.to_string(),
            });
        }

        if data.len() != config::ADDRESS_LENGTH {
            return Err(AddressError::InvalidDataLength {
                expected: config::ADDRESS_LENGTH,
                got: data.len(),
            });
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&data);
        Ok(Self { hash })
    }

    /// The raw 32-byte hash underlying this address.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    /// A short prefix of the address for compact log lines.
    pub fn short(&self) -> String {
        let full = self.to_bech32();
        full[..full.len().min(16)].to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bech32())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_bech32())
        } else {
            serializer.serialize_bytes(&self.hash)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Address::from_bech32(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            if bytes.len() != 32 {
                return Err(serde::de::Error::custom(format!(
                    "expected 32-byte address hash, got {}",
                    bytes.len()
                )));
            }
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&bytes);
            Ok(Address { hash })
        }
    }
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// A signing identity: an Ed25519 keypair and its derived address.
#[derive(Clone, Debug)]
pub struct Wallet {
    keypair: Keypair,
    address: Address,
}

impl Wallet {
    /// Generate a wallet with a fresh random keypair.
    pub fn generate() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// Build a wallet from an existing keypair.
    pub fn from_keypair(keypair: Keypair) -> Self {
        let address = Address::from_public_key(&keypair.public_key());
        Self { keypair, address }
    }

    /// Build a wallet deterministically from a 32-byte seed (tests).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_keypair(Keypair::from_seed(seed))
    }

    /// The wallet's account address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The wallet's public key.
    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// The underlying keypair, for signing.
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_has_drift_prefix() {
        let wallet = Wallet::generate();
        assert!(wallet.address().to_bech32().starts_with("drift1"));
    }

    #[test]
    fn address_roundtrips_through_bech32() {
        let wallet = Wallet::generate();
        let addr = wallet.address();
        let recovered = Address::from_bech32(&addr.to_bech32()).unwrap();
        assert_eq!(addr, recovered);
    }

    #[test]
    fn address_is_stable_for_a_key() {
        let wallet = Wallet::from_seed(&[7u8; 32]);
        let again = Wallet::from_seed(&[7u8; 32]);
        assert_eq!(wallet.address(), again.address());
    }

    #[test]
    fn distinct_keys_distinct_addresses() {
        assert_ne!(Wallet::generate().address(), Wallet::generate().address());
    }

    #[test]
    fn rejects_foreign_hrp() {
        // A Bitcoin bech32 address must not parse as a Drift address.
        let err = Address::from_bech32("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
        assert!(matches!(
            err,
            Err(AddressError::InvalidHrp { .. }) | Err(AddressError::Bech32Decode(_))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Address::from_bech32("not an address").is_err());
    }

    #[test]
    fn serde_json_uses_bech32_string() {
        let addr = Wallet::from_seed(&[1u8; 32]).address();
        let json = serde_json::to_string(&addr).unwrap();
        assert!(json.contains("drift1"));
        let recovered: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, recovered);
    }
}
