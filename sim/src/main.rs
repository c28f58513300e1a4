// Copyright (c) 2026 Drift Labs. MIT License.
// See LICENSE for details.

//! # Drift Simulator
//!
//! Entry point for the `drift-sim` binary. Parses CLI arguments,
//! initializes logging, builds a genesis allocation and a set of honest
//! nodes, drives the simulated network for the requested number of ticks,
//! lets in-flight traffic settle, and prints the final report.
//!
//! The run is reproducible: pass `--seed` to replay a previous simulation
//! exactly (the seed of every run is logged).

mod cli;
mod logging;
mod report;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use tokio::signal;

use drift_ledger::config;
use drift_ledger::identity::Wallet;
use drift_ledger::network::{NetworkSimulator, SimConfig};
use drift_ledger::node::Node;
use drift_ledger::state::Genesis;

use cli::{Commands, DriftSimCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DriftSimCli::parse();

    match cli.command {
        Commands::Run(args) => run_simulation(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Builds and drives the full simulation, then prints the report.
async fn run_simulation(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "drift_sim=info,drift_ledger=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    ensure!(args.nodes >= 2, "a network needs at least 2 nodes");
    ensure!(
        args.latency_min <= args.latency_max,
        "latency window is inverted: {} > {}",
        args.latency_min,
        args.latency_max
    );
    ensure!(
        (0.0..=1.0).contains(&args.duplicate_chance),
        "--duplicate-chance must be a probability"
    );
    ensure!(
        (0.0..=1.0).contains(&args.loss_chance),
        "--loss-chance must be a probability"
    );

    let seed = args.seed.unwrap_or_else(rand::random);
    tracing::info!(
        nodes = args.nodes,
        ticks = args.ticks,
        fanout = args.fanout,
        seed,
        "starting drift-sim"
    );

    // --- Identities and genesis ---
    // Every wallet gets the same allocation; every node gets its own deep
    // copy of the resulting ledger and the full address roster to draw
    // recipients from.
    let wallets: Vec<Wallet> = (0..args.nodes).map(|_| Wallet::generate()).collect();
    let mut genesis = Genesis::new();
    for wallet in &wallets {
        genesis.fund(wallet.address(), config::GENESIS_ALLOCATION);
    }
    let roster: Vec<_> = wallets.iter().map(|w| w.address()).collect();

    // --- Network ---
    let sim_config = SimConfig {
        latency_min: args.latency_min,
        latency_max: args.latency_max,
        duplicate_chance: args.duplicate_chance,
        loss_chance: args.loss_chance,
        origination_interval: args.origination_interval,
    };
    let mut sim = NetworkSimulator::new(sim_config, seed);
    for wallet in wallets {
        let node = Node::new(wallet, &genesis, roster.clone());
        sim.connect(node, args.fanout);
    }

    // --- Drive ---
    let completed = drive(&mut sim, args.ticks, args.tick_ms).await;
    if !completed {
        tracing::info!("interrupted, settling what is already in flight");
    }

    if sim.settle(args.settle_ticks) {
        tracing::info!(ticks = sim.now(), "network went quiet");
    } else {
        tracing::warn!(
            in_flight = sim.in_flight(),
            "settling window exhausted with traffic still in flight"
        );
    }

    // --- Report ---
    let report = report::build(&sim);
    if args.json {
        let json = serde_json::to_string_pretty(&report).context("serializing report")?;
        println!("{}", json);
    } else {
        report::print_human(&report);
    }

    Ok(())
}

/// Runs `ticks` simulation ticks, optionally paced at `tick_ms` wall-clock
/// milliseconds per tick. Returns `false` if interrupted by a shutdown
/// signal before finishing. The unpaced path runs to completion; shutdown
/// handling only matters when a run is slow enough to watch.
async fn drive(sim: &mut NetworkSimulator, ticks: u64, tick_ms: u64) -> bool {
    if tick_ms == 0 {
        for _ in 0..ticks {
            sim.tick();
        }
        return true;
    }

    let mut interval = tokio::time::interval(std::time::Duration::from_millis(tick_ms));
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    for _ in 0..ticks {
        tokio::select! {
            _ = interval.tick() => sim.tick(),
            _ = &mut shutdown => return false,
        }
    }
    true
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("drift-sim {}", env!("CARGO_PKG_VERSION"));
    println!("rustc     {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}
