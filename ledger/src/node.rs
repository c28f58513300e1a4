//! # Node
//!
//! One network participant: a wallet, a transaction engine over a private
//! ledger copy, a dedup set, and the policy for originating traffic.
//!
//! A node is logically single-threaded. Message receipt and
//! self-origination run one at a time over state the node owns
//! exclusively; all waiting is represented as buffered data inside the
//! engine, never as a blocked task. The `&mut self` on [`Node::receive`]
//! and [`Node::originate`] is the whole concurrency story.
//!
//! The list of known peer addresses is injected at construction. A node
//! has no other view of the topology; who its broadcasts actually reach
//! is entirely the network's business.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, trace, warn};

use crate::config;
use crate::crypto::keys::Keypair;
use crate::engine::{ApplyOutcome, Engine};
use crate::identity::{Address, Wallet};
use crate::network::Network;
use crate::state::Genesis;
use crate::transaction::{Transaction, TxBody, TxId};

// ---------------------------------------------------------------------------
// PeerId
// ---------------------------------------------------------------------------

/// A node's transport identity, distinct from its wallet address.
///
/// Derived from a throwaway keypair generated at construction. Keeping the
/// transport name separate from the signing identity means the network
/// layer never needs to know which wallet a node carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    fn generate() -> Self {
        Self(Keypair::generate().public_key().to_hex())
    }

    /// A short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A ledger node: identity, engine, dedup set, and origination policy.
pub struct Node {
    wallet: Wallet,
    peer_id: PeerId,
    /// Known peer wallet addresses, injected at construction. Recipients
    /// for originated transfers are drawn uniformly from this list (which
    /// includes the node's own address; a self-send is legal and merely
    /// consumes a nonce).
    peers: Vec<Address>,
    engine: Engine,
    /// Ids of every transaction this node has already processed. Checked
    /// on receipt so that redelivery by the network is a no-op.
    seen: HashSet<TxId>,
    /// Processing order, for reporting. Ids only; the transactions
    /// themselves are not retained.
    log: Vec<TxId>,
}

impl Node {
    /// Build a node over its own deep copy of the genesis allocation.
    pub fn new(wallet: Wallet, genesis: &Genesis, peers: Vec<Address>) -> Self {
        let peer_id = PeerId::generate();
        info!(
            peer = peer_id.short(),
            address = %wallet.address().short(),
            "node created"
        );
        Self {
            wallet,
            peer_id,
            peers,
            engine: Engine::new(genesis.ledger()),
            seen: HashSet::new(),
            log: Vec::new(),
        }
    }

    /// The node's wallet address.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    /// The node's transport identity.
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    /// Read access to the node's engine (ledger + pending buffer).
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Number of distinct transactions this node has processed.
    pub fn processed(&self) -> usize {
        self.log.len()
    }

    /// Handle a transaction delivered by the network.
    ///
    /// Safe to call any number of times with the same transaction: the
    /// first delivery is processed, every later one is dropped by the
    /// dedup set before it can touch the engine.
    ///
    /// A fresh transaction is applied (or buffered, or discarded) and then
    /// rebroadcast *regardless of the outcome*. Rebroadcasting buffered
    /// transactions matters: a peer further along this sender's nonce
    /// sequence may be able to apply what this node can only park. Even
    /// terminally discarded transactions are forwarded identically, so an
    /// observer cannot distinguish outcomes from traffic. Finally the
    /// sender's pending chain is drained, since the transaction just seen
    /// may have been the missing link for entries parked earlier.
    pub fn receive(&mut self, tx: Transaction, net: &mut dyn Network) {
        let id = tx.id();
        if !self.seen.insert(id) {
            trace!(peer = self.peer_id.short(), tx = %id.short(), "duplicate delivery dropped");
            return;
        }
        self.log.push(id);

        let sender = tx.body.from;
        match self.engine.apply(&tx) {
            Ok(ApplyOutcome::Applied) => {
                debug!(peer = self.peer_id.short(), tx = %id.short(), "applied");
            }
            Ok(ApplyOutcome::Buffered) => {
                debug!(peer = self.peer_id.short(), tx = %id.short(), "buffered");
            }
            Err(err) => {
                warn!(peer = self.peer_id.short(), tx = %id.short(), %err, "discarded");
            }
        }

        net.broadcast(&self.peer_id, tx);
        self.engine.drain_pending(&sender);
    }

    /// Originate one transfer, if policy allows.
    ///
    /// Abstains (returning `None`, a policy no-op rather than an error)
    /// when the node's own observed balance is below the abstain
    /// threshold. Otherwise: pick a uniformly random recipient from the
    /// injected peer list, build a `Send` of the fixed amount at the
    /// node's own ledger-observed nonce, sign it, apply it locally, and
    /// broadcast it.
    ///
    /// The local apply must succeed -- the node is always nonce-consistent
    /// with itself and just checked its balance. A failure here is an
    /// engine defect; it is logged and the transfer dropped, but it can
    /// never corrupt applied state.
    pub fn originate<R: Rng>(&mut self, rng: &mut R, net: &mut dyn Network) -> Option<TxId> {
        let me = self.wallet.address();
        let record = self.engine.ledger().record(&me);

        if record.balance < config::ABSTAIN_THRESHOLD {
            debug!(
                peer = self.peer_id.short(),
                balance = record.balance,
                "balance below threshold, abstaining"
            );
            return None;
        }

        let to = *self.peers.choose(rng)?;
        let tx = TxBody::send(me, to, config::SEND_AMOUNT, record.nonce).sign(self.wallet.keypair());
        let id = tx.id();

        self.seen.insert(id);
        self.log.push(id);

        match self.engine.apply(&tx) {
            Ok(ApplyOutcome::Applied) => {}
            other => {
                error!(
                    peer = self.peer_id.short(),
                    tx = %id.short(),
                    ?other,
                    "locally originated transfer failed to apply"
                );
                return None;
            }
        }

        debug!(
            peer = self.peer_id.short(),
            tx = %id.short(),
            to = %to.short(),
            nonce = record.nonce,
            "originated transfer"
        );
        net.broadcast(&self.peer_id, tx);
        Some(id)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("peer_id", &self.peer_id.short())
            .field("address", &self.wallet.address().short())
            .field("processed", &self.log.len())
            .field("pending", &self.engine.pending().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Outbox;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_node_setup() -> (Node, Node, Wallet, Wallet) {
        let alice = Wallet::from_seed(&[1u8; 32]);
        let bob = Wallet::from_seed(&[2u8; 32]);
        let mut genesis = Genesis::new();
        genesis.fund(alice.address(), config::GENESIS_ALLOCATION);
        genesis.fund(bob.address(), config::GENESIS_ALLOCATION);
        let peers = vec![alice.address(), bob.address()];

        let node_a = Node::new(alice.clone(), &genesis, peers.clone());
        let node_b = Node::new(bob.clone(), &genesis, peers);
        (node_a, node_b, alice, bob)
    }

    #[test]
    fn duplicate_delivery_is_idempotent() {
        let (mut node_a, _node_b, _alice, bob) = two_node_setup();
        let tx = TxBody::send(bob.address(), node_a.address(), 10, 0).sign(bob.keypair());

        let mut outbox = Outbox::default();
        node_a.receive(tx, &mut outbox);
        let after_first = node_a.engine().ledger().clone();

        node_a.receive(tx, &mut outbox);
        assert_eq!(node_a.engine().ledger(), &after_first);
        assert_eq!(node_a.processed(), 1);
        assert_eq!(outbox.len(), 1, "a duplicate must not be rebroadcast");
    }

    #[test]
    fn buffered_transactions_are_still_rebroadcast() {
        let (mut node_a, _node_b, _alice, bob) = two_node_setup();
        // Nonce 4 is far ahead of Bob's current 0; node A can only park it.
        let tx = TxBody::send(bob.address(), node_a.address(), 10, 4).sign(bob.keypair());

        let mut outbox = Outbox::default();
        node_a.receive(tx, &mut outbox);

        assert_eq!(node_a.engine().pending().len(), 1);
        assert_eq!(outbox.len(), 1);
    }

    #[test]
    fn discarded_transactions_are_rebroadcast_like_any_other() {
        let (mut node_a, _node_b, _alice, bob) = two_node_setup();
        let mut tx = TxBody::send(bob.address(), node_a.address(), 10, 0).sign(bob.keypair());
        tx.body.amount = 99; // break the signature

        let mut outbox = Outbox::default();
        node_a.receive(tx, &mut outbox);

        assert_eq!(outbox.len(), 1, "outcome must not be visible in traffic");
        assert_eq!(node_a.engine().ledger().record(&bob.address()).nonce, 0);
    }

    #[test]
    fn receive_drains_previously_parked_successors() {
        let (mut node_a, _node_b, _alice, bob) = two_node_setup();
        let t0 = TxBody::send(bob.address(), node_a.address(), 10, 0).sign(bob.keypair());
        let t1 = TxBody::send(bob.address(), node_a.address(), 10, 1).sign(bob.keypair());

        let mut outbox = Outbox::default();
        node_a.receive(t1, &mut outbox);
        assert_eq!(node_a.engine().ledger().record(&bob.address()).nonce, 0);

        node_a.receive(t0, &mut outbox);
        assert_eq!(node_a.engine().ledger().record(&bob.address()).nonce, 2);
        assert!(node_a.engine().pending().is_empty());
    }

    #[test]
    fn originate_applies_locally_and_broadcasts() {
        let (mut node_a, _node_b, alice, _bob) = two_node_setup();
        let mut rng = StdRng::seed_from_u64(7);
        let mut outbox = Outbox::default();

        let id = node_a.originate(&mut rng, &mut outbox);
        assert!(id.is_some());
        assert_eq!(outbox.len(), 1);
        assert_eq!(node_a.engine().ledger().record(&alice.address()).nonce, 1);
    }

    #[test]
    fn broke_node_abstains() {
        let alice = Wallet::from_seed(&[1u8; 32]);
        let genesis = Genesis::new(); // nobody funded
        let mut node = Node::new(alice.clone(), &genesis, vec![alice.address()]);

        let mut rng = StdRng::seed_from_u64(7);
        let mut outbox = Outbox::default();
        assert!(node.originate(&mut rng, &mut outbox).is_none());
        assert!(outbox.is_empty());
        assert_eq!(node.engine().ledger().record(&alice.address()).nonce, 0);
    }

    #[test]
    fn own_broadcast_redelivered_is_a_no_op() {
        // The network may echo a node's own transfer back at it; the dedup
        // set absorbs the echo.
        let (mut node_a, _node_b, alice, _bob) = two_node_setup();
        let mut rng = StdRng::seed_from_u64(7);
        let mut outbox = Outbox::default();

        node_a.originate(&mut rng, &mut outbox).unwrap();
        let (_, tx) = outbox.drain().pop().unwrap();
        let before = node_a.engine().ledger().clone();

        node_a.receive(tx, &mut outbox);
        assert_eq!(node_a.engine().ledger(), &before);
        assert!(outbox.is_empty());
        assert_eq!(node_a.engine().ledger().record(&alice.address()).nonce, 1);
    }
}
