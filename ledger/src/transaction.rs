//! # Transactions
//!
//! The signed transfer envelope and its canonical byte layout.
//!
//! A [`Transaction`] is immutable once constructed: a [`TxBody`] (what the
//! sender asserts), the sender's public key, and an Ed25519 signature over
//! the body's canonical bytes. The signer's key travels with the
//! transaction so any receiver can verify it without a key registry; the
//! binding between key and claimed sender is enforced by re-deriving the
//! address from the embedded key at verification time.
//!
//! ## Canonical bytes
//!
//! Signing and id computation use [`TxBody::signable_bytes`], a
//! deterministic concatenation with fixed-width little-endian integers.
//! JSON is deliberately avoided here: field ordering across serializers
//! is not a foundation to build signatures on.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::hash::double_sha256;
use crate::crypto::keys::{Keypair, PublicKey, Signature};
use crate::identity::Address;

// ---------------------------------------------------------------------------
// TxKind
// ---------------------------------------------------------------------------

/// The operation a transaction performs.
///
/// Only `Send` is meaningful today. The `Unknown` catch-all absorbs any
/// unrecognized kind arriving off the wire, so that a peer running a newer
/// rule set produces a clean terminal rejection at apply time instead of a
/// deserialization failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    /// Move `amount` units from `from` to `to`.
    Send,
    /// Any kind this build does not understand. Always rejected.
    Unknown,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send => write!(f, "send"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl Serialize for TxKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TxKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Tolerant on the tag: anything that is not "send" becomes
        // Unknown rather than a decode error, and is rejected later by
        // the engine's kind dispatch.
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "send" => TxKind::Send,
            _ => TxKind::Unknown,
        })
    }
}

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// Content-derived transaction identity: `double_sha256(signable_bytes)`.
///
/// Two transactions with the same body have the same id, regardless of
/// where or when they were observed -- which is exactly the equality a
/// cross-process dedup set needs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxId([u8; 32]);

impl TxId {
    /// Hex encoding, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// A short prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.short())
    }
}

impl Serialize for TxId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for TxId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Vec<u8> = if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            hex::decode(s).map_err(serde::de::Error::custom)?
        } else {
            Vec::deserialize(deserializer)?
        };
        let len = raw.len();
        let bytes: [u8; 32] = raw.try_into().map_err(|_| {
            serde::de::Error::custom(format!("expected 32-byte transaction id, got {}", len))
        })?;
        Ok(TxId(bytes))
    }
}

// ---------------------------------------------------------------------------
// TxBody
// ---------------------------------------------------------------------------

/// The asserted contents of a transfer: what, from whom, to whom, and the
/// sender's sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    /// Which operation this is.
    pub kind: TxKind,
    /// Units moved, in the smallest (only) denomination.
    pub amount: u64,
    /// The sender's account address. Must match the embedded signer key.
    pub from: Address,
    /// The recipient's account address.
    pub to: Address,
    /// Per-sender sequence number; replay protection and ordering in one.
    pub nonce: u64,
}

impl TxBody {
    /// Build a `Send` body.
    pub fn send(from: Address, to: Address, amount: u64, nonce: u64) -> Self {
        Self {
            kind: TxKind::Send,
            amount,
            from,
            to,
            nonce,
        }
    }

    /// The canonical byte representation used for signing and id
    /// computation: kind tag, null separator, sender hash, recipient hash,
    /// then amount and nonce as little-endian u64.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(96);
        buf.extend_from_slice(self.kind.to_string().as_bytes());
        buf.push(0x00);
        buf.extend_from_slice(self.from.as_bytes());
        buf.extend_from_slice(self.to.as_bytes());
        buf.extend_from_slice(&self.amount.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    /// The content-derived id of this body.
    pub fn id(&self) -> TxId {
        TxId(double_sha256(&self.signable_bytes()))
    }

    /// Sign this body, producing a complete [`Transaction`].
    ///
    /// The caller is responsible for signing with the keypair whose
    /// address equals `from`; a mismatch produces a transaction every
    /// honest engine rejects.
    pub fn sign(self, keypair: &Keypair) -> Transaction {
        let signature = keypair.sign(&self.signable_bytes());
        Transaction {
            body: self,
            signer_key: keypair.public_key(),
            signature,
        }
    }
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A signed transfer, immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The asserted transfer.
    pub body: TxBody,
    /// The sender's public key, carried inline for registry-free
    /// verification.
    pub signer_key: PublicKey,
    /// Ed25519 signature over [`TxBody::signable_bytes`].
    pub signature: Signature,
}

impl Transaction {
    /// The content-derived id (excludes key and signature, so the id is
    /// stable across re-signing).
    pub fn id(&self) -> TxId {
        self.body.id()
    }
}
