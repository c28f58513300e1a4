//! Deterministic delivery simulator.
//!
//! Owns the registered nodes and plays the role of the unreliable network
//! between them: every broadcast is fanned out to the origin's direct
//! neighbors with a randomly drawn latency, possibly duplicated, possibly
//! lost. Propagation beyond one hop happens only because receiving nodes
//! rebroadcast -- which is exactly why nodes forward even the transactions
//! they could only buffer.
//!
//! All randomness (latency draws, duplication, loss, recipient choice
//! during origination, topology wiring) flows through one seeded `StdRng`,
//! so a simulation is fully reproducible from its seed. The interesting
//! runs -- the ones where honest nodes end up disagreeing -- can be replayed
//! at will.
//!
//! Time is a bare tick counter. Nothing here is async: the simulator
//! mutates one node at a time, which is the single-writer discipline each
//! node's state requires.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config;
use crate::network::Outbox;
use crate::node::{Node, PeerId};
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable parameters for the simulated network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Lower bound of the delivery latency window, in ticks. Clamped to at
    /// least 1: a zero-latency delivery would land in the past.
    pub latency_min: u64,
    /// Upper bound of the delivery latency window, in ticks.
    pub latency_max: u64,
    /// Probability that a delivery is duplicated (a second copy is
    /// scheduled with its own latency draw).
    pub duplicate_chance: f64,
    /// Probability that a delivery is silently dropped.
    pub loss_chance: f64,
    /// Every node originates one transfer each time this many ticks
    /// elapse. Zero disables origination entirely (delivery-only mode).
    pub origination_interval: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            latency_min: config::DEFAULT_LATENCY_MIN,
            latency_max: config::DEFAULT_LATENCY_MAX,
            duplicate_chance: config::DEFAULT_DUPLICATE_CHANCE,
            loss_chance: config::DEFAULT_LOSS_CHANCE,
            origination_interval: config::DEFAULT_ORIGINATION_INTERVAL,
        }
    }
}

/// Delivery counters, for the end-of-run report.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SimStats {
    /// Messages handed to a node's `receive`.
    pub delivered: u64,
    /// Messages silently dropped by the loss model.
    pub lost: u64,
    /// Extra copies injected by the duplication model.
    pub duplicated: u64,
}

// ---------------------------------------------------------------------------
// NetworkSimulator
// ---------------------------------------------------------------------------

/// The simulated network: registered nodes, wiring, and an in-flight
/// message schedule keyed by delivery tick.
pub struct NetworkSimulator {
    cfg: SimConfig,
    nodes: Vec<Node>,
    /// Node index by transport identity, for resolving broadcast origins.
    index: HashMap<PeerId, usize>,
    /// Direct peer links, by node index. Undirected: wiring A to B also
    /// wires B to A.
    adjacency: Vec<Vec<usize>>,
    /// In-flight messages: delivery tick -> (target node index, transaction).
    schedule: BTreeMap<u64, Vec<(usize, Transaction)>>,
    rng: StdRng,
    now: u64,
    stats: SimStats,
}

impl NetworkSimulator {
    /// Build an empty simulated network from a config and a seed.
    pub fn new(cfg: SimConfig, seed: u64) -> Self {
        info!(seed, ?cfg, "network simulator created");
        Self {
            cfg,
            nodes: Vec::new(),
            index: HashMap::new(),
            adjacency: Vec::new(),
            schedule: BTreeMap::new(),
            rng: StdRng::seed_from_u64(seed),
            now: 0,
            stats: SimStats::default(),
        }
    }

    /// Register a node and wire it to up to `fanout` randomly chosen
    /// existing peers. Links are bidirectional. Registration is entirely
    /// the network's business; the node itself never learns the topology.
    pub fn connect(&mut self, node: Node, fanout: usize) {
        let idx = self.nodes.len();
        self.index.insert(node.peer_id().clone(), idx);
        self.adjacency.push(Vec::new());

        let mut candidates: Vec<usize> = (0..idx).collect();
        candidates.shuffle(&mut self.rng);
        for &peer in candidates.iter().take(fanout) {
            self.adjacency[idx].push(peer);
            self.adjacency[peer].push(idx);
        }

        debug!(
            peer = node.peer_id().short(),
            links = self.adjacency[idx].len(),
            "node connected"
        );
        self.nodes.push(node);
    }

    /// Advance one tick: deliver everything due now, then (on the
    /// origination cadence) let every node originate.
    pub fn tick(&mut self) {
        self.step(true);
    }

    /// Run `ticks` ticks.
    pub fn run(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    /// Deliver-only ticks until the schedule is empty or `max_ticks`
    /// elapse. No origination. Returns `true` if the network went quiet.
    ///
    /// Note that a quiet network does not imply agreement: transactions
    /// parked against a missing nonce stay parked forever, and nodes that
    /// dropped a transfer for insufficient funds stay diverged.
    pub fn settle(&mut self, max_ticks: u64) -> bool {
        for _ in 0..max_ticks {
            if self.schedule.is_empty() {
                return true;
            }
            self.step(false);
        }
        self.schedule.is_empty()
    }

    /// The registered nodes, for inspection and reporting.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Number of messages currently in flight.
    pub fn in_flight(&self) -> usize {
        self.schedule.values().map(|batch| batch.len()).sum()
    }

    /// The current tick.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Delivery counters so far.
    pub fn stats(&self) -> SimStats {
        self.stats
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn step(&mut self, originate: bool) {
        self.now += 1;

        let mut outbox = Outbox::default();

        let due = self.schedule.remove(&self.now).unwrap_or_default();
        for (target, tx) in due {
            self.stats.delivered += 1;
            self.nodes[target].receive(tx, &mut outbox);
        }

        if originate
            && self.cfg.origination_interval > 0
            && self.now % self.cfg.origination_interval == 0
        {
            for i in 0..self.nodes.len() {
                self.nodes[i].originate(&mut self.rng, &mut outbox);
            }
        }

        for (origin, tx) in outbox.drain() {
            self.fan_out(&origin, tx);
        }
    }

    /// Schedule a broadcast from `origin` to each of its direct neighbors,
    /// applying the loss, latency, and duplication models per target.
    fn fan_out(&mut self, origin: &PeerId, tx: Transaction) {
        let Some(&from) = self.index.get(origin) else {
            // A broadcast from an unregistered origin has nowhere to go.
            return;
        };

        let neighbors = self.adjacency[from].clone();
        for target in neighbors {
            if self.cfg.loss_chance > 0.0 && self.rng.gen_bool(self.cfg.loss_chance) {
                self.stats.lost += 1;
                continue;
            }

            self.schedule_delivery(target, tx);

            if self.cfg.duplicate_chance > 0.0 && self.rng.gen_bool(self.cfg.duplicate_chance) {
                self.stats.duplicated += 1;
                self.schedule_delivery(target, tx);
            }
        }
    }

    fn schedule_delivery(&mut self, target: usize, tx: Transaction) {
        let lo = self.cfg.latency_min.max(1);
        let hi = self.cfg.latency_max.max(lo);
        let latency = self.rng.gen_range(lo..=hi);
        self.schedule
            .entry(self.now + latency)
            .or_default()
            .push((target, tx));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
