//! # Cryptographic Primitives
//!
//! Everything security-related flows through this module, and all of it is
//! a thin, type-safe wrapper around audited implementations:
//!
//! - **Ed25519** (`ed25519-dalek`) for transaction signatures.
//! - **SHA-256** (`sha2`), double-hashed, for transaction ids.
//! - **BLAKE3** for address derivation.
//!
//! Nothing in here is novel, and that is the point.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, double_sha256, sha256};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
