//! # CLI Interface
//!
//! Command-line argument structure for `drift-sim`, via `clap` derive.
//! Two subcommands: `run` drives a simulation, `version` prints build
//! information.
//!
//! Every knob of the delivery model is exposed so that interesting
//! failure modes can be dialed in from the shell: raise `--loss-chance`
//! to strand transfers in pending buffers, shrink the latency window to
//! make the network boringly reliable, or pin `--seed` to replay a run
//! that produced a divergence worth staring at.

use clap::{Parser, Subcommand};

use drift_ledger::config;

/// Drift network simulator.
///
/// Spins up a set of honest ledger nodes over a simulated network that
/// delays, reorders, duplicates, and (optionally) loses messages, then
/// reports each node's final view of the world and where those views
/// disagree.
#[derive(Parser, Debug)]
#[command(
    name = "drift-sim",
    about = "Drift network simulator",
    version,
    propagate_version = true
)]
pub struct DriftSimCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulation and print the final report.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Number of nodes in the simulation.
    #[arg(long, env = "DRIFT_NODES", default_value_t = 5)]
    pub nodes: usize,

    /// Number of ticks to run before settling.
    #[arg(long, env = "DRIFT_TICKS", default_value_t = config::DEFAULT_TICKS)]
    pub ticks: u64,

    /// Peer links wired per node at registration.
    #[arg(long, default_value_t = config::DEFAULT_FANOUT)]
    pub fanout: usize,

    /// RNG seed for the delivery model. Omit for a random seed (the chosen
    /// seed is logged, so any run can be replayed).
    #[arg(long, env = "DRIFT_SEED")]
    pub seed: Option<u64>,

    /// Lower bound of the delivery latency window, in ticks.
    #[arg(long, default_value_t = config::DEFAULT_LATENCY_MIN)]
    pub latency_min: u64,

    /// Upper bound of the delivery latency window, in ticks.
    #[arg(long, default_value_t = config::DEFAULT_LATENCY_MAX)]
    pub latency_max: u64,

    /// Probability that a delivery is duplicated.
    #[arg(long, default_value_t = config::DEFAULT_DUPLICATE_CHANCE)]
    pub duplicate_chance: f64,

    /// Probability that a delivery is silently lost.
    #[arg(long, default_value_t = config::DEFAULT_LOSS_CHANCE)]
    pub loss_chance: f64,

    /// Every node originates one transfer each time this many ticks
    /// elapse (0 disables origination).
    #[arg(long, default_value_t = config::DEFAULT_ORIGINATION_INTERVAL)]
    pub origination_interval: u64,

    /// Wall-clock milliseconds per tick. 0 runs the simulation as fast as
    /// possible; a positive value paces it so the logs can be watched live.
    #[arg(long, default_value_t = 0)]
    pub tick_ms: u64,

    /// Maximum delivery-only ticks granted for the network to go quiet
    /// after the run.
    #[arg(long, default_value_t = 10_000)]
    pub settle_ticks: u64,

    /// Emit the report as JSON on stdout instead of the human table.
    #[arg(long)]
    pub json: bool,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "DRIFT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}
