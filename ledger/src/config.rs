//! # Protocol Configuration & Constants
//!
//! Every magic number in Drift lives here. The values are tuned for a
//! readable simulation, not for realism: balances small enough to do the
//! arithmetic in your head, latency windows wide enough that reordering
//! actually happens.

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// Human-readable prefix for Bech32 account addresses.
pub const ADDRESS_HRP: &str = "drift";

/// Length of the raw address payload in bytes (a BLAKE3 digest).
pub const ADDRESS_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 secret keys are 32 bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Ed25519 public keys are 32 bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signatures are 64 bytes, always.
pub const SIGNATURE_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Ledger Parameters
// ---------------------------------------------------------------------------

/// Balance granted to every wallet in the genesis allocation.
pub const GENESIS_ALLOCATION: u64 = 100;

/// Fixed amount moved by every originated transfer.
pub const SEND_AMOUNT: u64 = 10;

/// A node whose own balance is below this abstains from originating.
/// Equal to [`SEND_AMOUNT`]: a node never knowingly signs a transfer it
/// cannot cover in its own view of the ledger.
pub const ABSTAIN_THRESHOLD: u64 = 10;

// ---------------------------------------------------------------------------
// Simulator Defaults
// ---------------------------------------------------------------------------

/// Number of peer links each newly registered node is wired to.
pub const DEFAULT_FANOUT: usize = 2;

/// Lower bound of the per-message delivery latency window, in ticks.
pub const DEFAULT_LATENCY_MIN: u64 = 1;

/// Upper bound of the per-message delivery latency window, in ticks.
pub const DEFAULT_LATENCY_MAX: u64 = 9;

/// Probability that a delivery is duplicated by the network.
pub const DEFAULT_DUPLICATE_CHANCE: f64 = 0.05;

/// Probability that a delivery is silently lost. Zero by default so that
/// the stock simulation converges; raise it to watch pending buffers
/// accumulate permanent entries.
pub const DEFAULT_LOSS_CHANCE: f64 = 0.0;

/// Every node originates one transfer each time this many ticks elapse.
pub const DEFAULT_ORIGINATION_INTERVAL: u64 = 10;

/// Default number of ticks a simulation runs before settling.
pub const DEFAULT_TICKS: u64 = 300;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_parameter_sizes() {
        assert_eq!(SIGNING_KEY_LENGTH, 32);
        assert_eq!(VERIFYING_KEY_LENGTH, 32);
        assert_eq!(SIGNATURE_LENGTH, 64);
        assert_eq!(ADDRESS_LENGTH, 32);
    }

    #[test]
    fn abstain_threshold_covers_send_amount() {
        // A node that passes the abstain check must always be able to fund
        // its own transfer. If this fails, honest nodes sign transfers they
        // cannot cover and the engine rejects locally originated traffic.
        assert!(ABSTAIN_THRESHOLD >= SEND_AMOUNT);
    }

    #[test]
    fn genesis_funds_several_transfers() {
        assert!(GENESIS_ALLOCATION >= SEND_AMOUNT * 2);
    }

    #[test]
    fn latency_window_is_ordered() {
        assert!(DEFAULT_LATENCY_MIN <= DEFAULT_LATENCY_MAX);
        assert!(DEFAULT_LATENCY_MIN >= 1, "zero latency would deliver into the past");
    }

    #[test]
    fn chances_are_probabilities() {
        assert!((0.0..=1.0).contains(&DEFAULT_DUPLICATE_CHANCE));
        assert!((0.0..=1.0).contains(&DEFAULT_LOSS_CHANCE));
    }
}
