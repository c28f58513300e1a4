// Copyright (c) 2026 Drift Labs. MIT License.
// See LICENSE for details.

//! # Drift -- Core Library
//!
//! Drift is a deliberately small peer-to-peer ledger: a handful of honest
//! nodes, each with a private copy of the account state, exchanging signed
//! transactions over a network that delays, reorders, and duplicates
//! messages. No blocks, no consensus, no persistence. What's left is the
//! interesting part -- per-account replay protection colliding with
//! unreliable delivery, and the ways honest nodes end up disagreeing
//! anyway.
//!
//! ## Architecture
//!
//! The crate is split into modules that mirror the moving parts:
//!
//! - **crypto** -- Ed25519 signing and the hash functions. Thin wrappers,
//!   nothing homemade.
//! - **identity** -- Wallets and Bech32 addresses derived from public keys.
//! - **transaction** -- The signed transfer envelope and its canonical bytes.
//! - **state** -- Account records, the genesis allocation, and each node's
//!   private ledger copy.
//! - **engine** -- The transaction engine: verify, nonce-gate, buffer,
//!   replay. The heart of the crate.
//! - **node** -- One participant: a wallet, an engine, a dedup set, and the
//!   decision of what to send next.
//! - **network** -- The collaborator contract plus a deterministic
//!   simulator that supplies the unreliable delivery.
//! - **config** -- Protocol constants and simulator defaults.
//!
//! ## Design Philosophy
//!
//! 1. The engine is pure and synchronous. All waiting is data, never a
//!    blocked task.
//! 2. Validation failures are values. Nothing unwinds through the node or
//!    the network loop.
//! 3. The simulator is seeded. Every run is reproducible, including the
//!    runs where the nodes disagree -- especially those.

pub mod config;
pub mod crypto;
pub mod engine;
pub mod identity;
pub mod network;
pub mod node;
pub mod state;
pub mod transaction;
