//! # Network Module
//!
//! The contract between a node and whatever delivers its messages, plus a
//! deterministic simulator that honors (and abuses) that contract.
//!
//! ## Architecture
//!
//! ```text
//! mod.rs -- The `Network` trait and the `Outbox` collector
//! sim.rs -- Seeded delivery simulator: latency, reordering, duplication, loss
//! ```
//!
//! ## The contract
//!
//! The core asks exactly one thing of the network: [`Network::broadcast`]
//! is fire-and-forget. The network decides fanout, delay, ordering, and
//! whether a message is duplicated or lost. In return, the network may
//! invoke [`crate::node::Node::receive`] any number of times with the same
//! transaction, in any order relative to other senders' traffic. The
//! node's dedup set and the engine's nonce buffer are what make that
//! tolerable.

pub mod sim;

use crate::node::PeerId;
use crate::transaction::Transaction;

pub use sim::{NetworkSimulator, SimConfig, SimStats};

/// The delivery collaborator, as seen from a node.
///
/// `origin` names the broadcasting node's transport identity so the
/// network can avoid echoing a message straight back at its sender.
pub trait Network {
    /// Hand a transaction to the network for propagation. Fire-and-forget.
    fn broadcast(&mut self, origin: &PeerId, tx: Transaction);
}

/// A [`Network`] that records broadcasts instead of delivering them.
///
/// The simulator hands an `Outbox` to each node it drives, then drains the
/// collected messages into its delivery schedule afterwards. Tests use it
/// to assert on exactly what a node chose to broadcast.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Vec<(PeerId, Transaction)>,
}

impl Outbox {
    /// Take all collected broadcasts, leaving the outbox empty.
    pub fn drain(&mut self) -> Vec<(PeerId, Transaction)> {
        std::mem::take(&mut self.messages)
    }

    /// Number of collected broadcasts.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// `true` if nothing was broadcast.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Network for Outbox {
    fn broadcast(&mut self, origin: &PeerId, tx: Transaction) {
        self.messages.push((origin.clone(), tx));
    }
}
