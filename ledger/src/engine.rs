//! # Transaction Engine
//!
//! The central state-transition machinery: verify a signed transfer,
//! gate it on the sender's nonce, apply it or buffer it, and replay
//! buffered successors once the gap closes.
//!
//! ## Lifecycle of a received transaction
//!
//! ```text
//! Received -> Discarded(InvalidSignature)
//!          -> Buffered ---------------------+
//!          -> Applied                       |
//!          -> Discarded(InsufficientFunds   |
//!                       | InvalidKind)      |
//!                ^                          |
//!                +---- replay on nonce catch-up
//! ```
//!
//! `Buffered` is not terminal: the entry sits in the pending buffer until
//! the sender's ledger nonce reaches it, at which point it is replayed and
//! either applies or is discarded. Nothing ever times out; a permanently
//! missing predecessor leaves a permanently buffered entry, which is the
//! accepted liveness gap of this design.
//!
//! ## What is deliberately NOT retried
//!
//! An `InsufficientFunds` rejection is terminal even though the nonce
//! matched. The nonce is only advanced on success, so the slot stays open
//! and a later transfer at the same nonce can still succeed. Two honest
//! nodes that see the same transfers in different orders can therefore
//! disagree about which of them applied -- this is the divergence the
//! system exists to demonstrate, not a defect to paper over.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::{debug, warn};

use crate::identity::Address;
use crate::state::LedgerState;
use crate::transaction::{Transaction, TxKind};

// ---------------------------------------------------------------------------
// Outcomes and errors
// ---------------------------------------------------------------------------

/// What happened to a transaction that was accepted by [`Engine::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The transfer executed and the ledger was mutated.
    Applied,
    /// The nonce is not yet current; the transfer is parked in the pending
    /// buffer and the ledger was not touched.
    Buffered,
}

/// Terminal rejections. A transaction that earns one of these is dropped:
/// never buffered, never retried, no state mutated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    /// The embedded signer key does not belong to the claimed sender, or
    /// the signature does not verify over the canonical bytes.
    #[error("signature does not verify against sender {sender}")]
    InvalidSignature {
        /// The sender the transaction claimed.
        sender: Address,
    },

    /// The transaction kind is not one this build executes.
    #[error("unrecognized transaction kind")]
    InvalidKind,

    /// The sender cannot cover the amount, despite the nonce being current.
    #[error("insufficient funds: balance {balance}, need {needed}")]
    InsufficientFunds {
        /// The sender's balance at apply time.
        balance: u64,
        /// The amount the transfer required.
        needed: u64,
    },
}

// ---------------------------------------------------------------------------
// Signature verification
// ---------------------------------------------------------------------------

/// Verify a transaction's signature and return the signer's address.
///
/// Two checks, both required:
///
/// 1. The address derived from the embedded signer key must equal
///    `body.from`. This blocks key substitution: a valid signature from
///    the wrong key proves nothing about the claimed sender.
/// 2. The Ed25519 signature must verify over the body's canonical bytes.
///
/// No side effects; safe to call on any transaction from anywhere.
pub fn verify_signature(tx: &Transaction) -> Result<Address, ApplyError> {
    let signer = Address::from_public_key(&tx.signer_key);
    if signer != tx.body.from {
        return Err(ApplyError::InvalidSignature {
            sender: tx.body.from,
        });
    }
    if !tx.signer_key.verify(&tx.body.signable_bytes(), &tx.signature) {
        return Err(ApplyError::InvalidSignature {
            sender: tx.body.from,
        });
    }
    Ok(signer)
}

// ---------------------------------------------------------------------------
// PendingBuffer
// ---------------------------------------------------------------------------

/// Out-of-nonce-order transactions, parked per sender per nonce.
///
/// The inner map is a `BTreeMap` keyed by nonce so that replay naturally
/// walks ascending nonces. Inserting at an occupied slot overwrites:
/// duplicate nonces from an honest signer carry identical bodies, so
/// last-write-wins loses nothing.
#[derive(Debug, Clone, Default)]
pub struct PendingBuffer {
    by_sender: HashMap<Address, BTreeMap<u64, Transaction>>,
}

impl PendingBuffer {
    /// Park a transaction under its sender and nonce.
    fn insert(&mut self, tx: Transaction) {
        self.by_sender
            .entry(tx.body.from)
            .or_default()
            .insert(tx.body.nonce, tx);
    }

    /// Remove and return the entry for `sender` at exactly `nonce`.
    fn take(&mut self, sender: &Address, nonce: u64) -> Option<Transaction> {
        let slots = self.by_sender.get_mut(sender)?;
        let tx = slots.remove(&nonce);
        if slots.is_empty() {
            self.by_sender.remove(sender);
        }
        tx
    }

    /// Number of parked transactions across all senders.
    pub fn len(&self) -> usize {
        self.by_sender.values().map(|slots| slots.len()).sum()
    }

    /// `true` if nothing is parked.
    pub fn is_empty(&self) -> bool {
        self.by_sender.is_empty()
    }

    /// Number of parked transactions for one sender.
    pub fn pending_for(&self, sender: &Address) -> usize {
        self.by_sender.get(sender).map_or(0, |slots| slots.len())
    }

    /// Iterate over all parked `(sender, nonce)` slots, for reporting.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, u64)> {
        self.by_sender
            .iter()
            .flat_map(|(sender, slots)| slots.keys().map(move |nonce| (sender, *nonce)))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// One node's transaction engine: its ledger plus its pending buffer.
///
/// Purely synchronous, no suspension points, no internal locking. The
/// exclusive-access boundary is the `&mut self` borrow; whoever owns the
/// engine owns its state.
#[derive(Debug, Clone)]
pub struct Engine {
    ledger: LedgerState,
    pending: PendingBuffer,
}

impl Engine {
    /// Wrap a (freshly deep-copied) ledger.
    pub fn new(ledger: LedgerState) -> Self {
        Self {
            ledger,
            pending: PendingBuffer::default(),
        }
    }

    /// Read access to the ledger.
    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    /// Read access to the pending buffer.
    pub fn pending(&self) -> &PendingBuffer {
        &self.pending
    }

    /// Validate and apply one transaction.
    ///
    /// The steps, in order:
    ///
    /// 1. Verify the signature. Failure is fatal for this transaction; it
    ///    is discarded, not buffered.
    /// 2. Materialize the recipient's account at `{0, 0}` if absent. This
    ///    happens before the nonce check, so even a transfer that ends up
    ///    buffered has already introduced its recipient to the ledger.
    /// 3. Compare the nonce against the sender's current ledger nonce. On
    ///    mismatch, park the transaction (overwriting any prior entry at
    ///    that exact slot) and return `Buffered` without touching the
    ///    ledger.
    /// 4. Execute by kind. `Send` fails with `InsufficientFunds` when the
    ///    balance cannot cover the amount; unknown kinds fail with
    ///    `InvalidKind`. Both are terminal and advance nothing -- in
    ///    particular, a funds failure leaves the nonce slot open for a
    ///    later transfer.
    /// 5. On success: debit sender, credit recipient, advance the sender's
    ///    nonce by exactly 1.
    /// 6. Replay any parked successors that the new nonce unblocks, in
    ///    strict ascending order.
    ///
    /// All checks precede all mutations: a rejected transaction leaves the
    /// engine exactly as it found it.
    pub fn apply(&mut self, tx: &Transaction) -> Result<ApplyOutcome, ApplyError> {
        verify_signature(tx)?;

        self.ledger.materialize(tx.body.to);

        let expected = self.ledger.record(&tx.body.from).nonce;
        if tx.body.nonce != expected {
            debug!(
                tx = %tx.id().short(),
                sender = %tx.body.from.short(),
                nonce = tx.body.nonce,
                expected,
                "nonce not current, buffering"
            );
            self.pending.insert(*tx);
            return Ok(ApplyOutcome::Buffered);
        }

        self.execute(tx)?;
        self.drain_pending(&tx.body.from);
        Ok(ApplyOutcome::Applied)
    }

    /// Replay parked transactions for `sender` while the buffer holds an
    /// entry at the current ledger nonce.
    ///
    /// Iterative on purpose: a long chain of buffered successors replays
    /// in a loop, one nonce per step, without growing the stack. A
    /// replayed entry that fails terminally is logged and dropped,
    /// completing its `Buffered -> Discarded` lifecycle; since the nonce
    /// did not advance, the loop then finds no entry and stops.
    ///
    /// Returns the number of transactions applied.
    pub fn drain_pending(&mut self, sender: &Address) -> usize {
        let mut applied = 0;
        loop {
            let next = self.ledger.record(sender).nonce;
            let Some(tx) = self.pending.take(sender, next) else {
                break;
            };
            // The signature was verified before the entry was parked.
            match self.execute(&tx) {
                Ok(()) => {
                    debug!(
                        tx = %tx.id().short(),
                        sender = %sender.short(),
                        nonce = next,
                        "replayed buffered transaction"
                    );
                    applied += 1;
                }
                Err(err) => {
                    warn!(
                        tx = %tx.id().short(),
                        sender = %sender.short(),
                        nonce = next,
                        %err,
                        "buffered transaction discarded on replay"
                    );
                }
            }
        }
        applied
    }

    /// Execute a nonce-current transaction against the ledger.
    ///
    /// Checks first, mutations second, so a rejection is side-effect free.
    fn execute(&mut self, tx: &Transaction) -> Result<(), ApplyError> {
        match tx.body.kind {
            TxKind::Send => {
                let balance = self.ledger.record(&tx.body.from).balance;
                if balance < tx.body.amount {
                    return Err(ApplyError::InsufficientFunds {
                        balance,
                        needed: tx.body.amount,
                    });
                }
                // Sequential mutations so a self-send (from == to) nets to
                // an unchanged balance with the nonce still consumed.
                self.ledger.materialize(tx.body.from).balance -= tx.body.amount;
                self.ledger.materialize(tx.body.to).balance += tx.body.amount;
                self.ledger.materialize(tx.body.from).nonce += 1;
                Ok(())
            }
            TxKind::Unknown => Err(ApplyError::InvalidKind),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
