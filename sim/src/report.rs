//! # Simulation Report
//!
//! Turns a finished [`NetworkSimulator`] into something a human (or a
//! script) can judge: every node's final account table, the transfers
//! still parked in pending buffers, and -- the headline number -- the set
//! of accounts on which any two honest nodes disagree.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use drift_ledger::identity::Address;
use drift_ledger::network::{NetworkSimulator, SimStats};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// One account row in a node's view.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AccountLine {
    /// Spendable units in this node's view.
    pub balance: u64,
    /// Next expected nonce in this node's view.
    pub nonce: u64,
}

/// A transfer still parked against a missing nonce.
#[derive(Debug, Clone, Serialize)]
pub struct ParkedEntry {
    /// The sender whose nonce sequence has the gap.
    pub sender: String,
    /// The nonce the parked transfer is waiting to become current.
    pub nonce: u64,
}

/// One node's final state.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    /// Transport identity (short form).
    pub peer: String,
    /// The node's own wallet address.
    pub address: String,
    /// Distinct transactions processed.
    pub processed: usize,
    /// Transfers still parked against a missing nonce. With no expiry in
    /// the design, every entry here is permanent.
    pub parked: Vec<ParkedEntry>,
    /// The node's full account table, keyed by address.
    pub accounts: BTreeMap<String, AccountLine>,
}

/// The complete end-of-run report.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    /// Final tick count, including the settling phase.
    pub ticks: u64,
    /// Delivery counters from the network model.
    pub stats: SimStats,
    /// Messages never delivered (nonzero when settling timed out).
    pub in_flight: usize,
    /// Per-node final state.
    pub nodes: Vec<NodeReport>,
    /// Addresses on which at least two nodes disagree.
    pub divergent_accounts: Vec<String>,
    /// `true` when every node holds an identical ledger.
    pub converged: bool,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// Build the report from a finished simulation.
pub fn build(sim: &NetworkSimulator) -> SimReport {
    // Union of every address any node has materialized.
    let mut all_addresses: BTreeSet<Address> = BTreeSet::new();
    for node in sim.nodes() {
        for (addr, _) in node.engine().ledger().iter() {
            all_addresses.insert(*addr);
        }
    }

    // An address diverges when two nodes hold different records for it.
    // Absent records count as the implicit {0, 0}.
    let mut divergent: Vec<String> = Vec::new();
    for addr in &all_addresses {
        let mut views = sim
            .nodes()
            .iter()
            .map(|n| n.engine().ledger().record(addr));
        let first = views.next().unwrap_or_default();
        if views.any(|v| v != first) {
            divergent.push(addr.to_bech32());
        }
    }

    let nodes = sim
        .nodes()
        .iter()
        .map(|node| {
            let accounts = node
                .engine()
                .ledger()
                .iter()
                .map(|(addr, rec)| {
                    (
                        addr.to_bech32(),
                        AccountLine {
                            balance: rec.balance,
                            nonce: rec.nonce,
                        },
                    )
                })
                .collect();
            let parked = node
                .engine()
                .pending()
                .iter()
                .map(|(sender, nonce)| ParkedEntry {
                    sender: sender.to_bech32(),
                    nonce,
                })
                .collect();
            NodeReport {
                peer: node.peer_id().short().to_string(),
                address: node.address().to_bech32(),
                processed: node.processed(),
                parked,
                accounts,
            }
        })
        .collect();

    SimReport {
        ticks: sim.now(),
        stats: sim.stats(),
        in_flight: sim.in_flight(),
        nodes,
        converged: divergent.is_empty(),
        divergent_accounts: divergent,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Print the human-readable report to stdout.
pub fn print_human(report: &SimReport) {
    println!("==== drift simulation report ====");
    println!(
        "ticks {}   delivered {}   lost {}   duplicated {}   undelivered {}",
        report.ticks,
        report.stats.delivered,
        report.stats.lost,
        report.stats.duplicated,
        report.in_flight,
    );

    for (i, node) in report.nodes.iter().enumerate() {
        println!();
        println!(
            "-- node {} [{}] {} --",
            i,
            node.peer,
            shorten(&node.address)
        );
        println!(
            "   processed {}   pending {}",
            node.processed,
            node.parked.len()
        );
        for (addr, line) in &node.accounts {
            println!(
                "   {:<20} balance {:>6}   nonce {:>4}",
                shorten(addr),
                line.balance,
                line.nonce
            );
        }
        for entry in &node.parked {
            println!(
                "   parked: {} waiting at nonce {}",
                shorten(&entry.sender),
                entry.nonce
            );
        }
    }

    println!();
    if report.converged {
        println!("all nodes agree on every account");
    } else {
        println!(
            "nodes DIVERGE on {} account(s):",
            report.divergent_accounts.len()
        );
        for addr in &report.divergent_accounts {
            println!("   {}", shorten(addr));
        }
    }
}

/// Truncate an address for table display.
fn shorten(addr: &str) -> String {
    if addr.len() <= 20 {
        addr.to_string()
    } else {
        format!("{}..", &addr[..18])
    }
}
