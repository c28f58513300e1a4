//! # Ledger State
//!
//! Account records, the shared genesis allocation, and each node's private
//! ledger copy.
//!
//! A node's [`LedgerState`] is pure data: a map from address to
//! `{balance, nonce}`, mutated only by the transaction engine. Every node
//! starts from a deep copy of the same [`Genesis`] snapshot -- identical
//! starting balances, fully independent mutable state, no aliasing between
//! nodes. From that moment on, a node's ledger is purely a function of the
//! message arrival order it personally observed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::identity::Address;

// ---------------------------------------------------------------------------
// AccountRecord
// ---------------------------------------------------------------------------

/// The state of a single account.
///
/// `balance` is unsigned and can never go negative; the engine checks
/// funds before debiting. `nonce` is the next sequence number expected
/// from this account and advances by exactly 1 per applied outgoing
/// transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    /// Spendable units.
    pub balance: u64,
    /// Next expected outgoing nonce.
    pub nonce: u64,
}

impl AccountRecord {
    /// A fresh account with the given balance and nonce 0.
    pub fn with_balance(balance: u64) -> Self {
        Self { balance, nonce: 0 }
    }
}

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// The shared starting allocation.
///
/// Built once at simulation setup and handed to every node by reference;
/// [`Genesis::ledger`] hands each node its own deep copy so no mutable
/// state is ever shared between node ledgers.
#[derive(Debug, Clone, Default)]
pub struct Genesis {
    accounts: HashMap<Address, AccountRecord>,
}

impl Genesis {
    /// An empty allocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `balance` units to `address` at nonce 0.
    pub fn fund(&mut self, address: Address, balance: u64) {
        self.accounts
            .insert(address, AccountRecord::with_balance(balance));
    }

    /// Number of funded accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// `true` if no account is funded.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Materialize an independent ledger from this allocation.
    ///
    /// This is a deep copy. Each call returns a ledger whose mutations are
    /// invisible to every other copy.
    pub fn ledger(&self) -> LedgerState {
        LedgerState {
            accounts: self.accounts.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// LedgerState
// ---------------------------------------------------------------------------

/// One node's private view of all account balances and nonces.
///
/// An address with no entry is implicitly `{balance: 0, nonce: 0}`; it is
/// materialized into the map lazily, the first time a transfer names it as
/// recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    accounts: HashMap<Address, AccountRecord>,
}

impl LedgerState {
    /// An empty ledger. Mostly useful in tests; real nodes start from
    /// [`Genesis::ledger`].
    pub fn new() -> Self {
        Self {
            accounts: HashMap::new(),
        }
    }

    /// The record for `address`, or the implicit `{0, 0}` if absent.
    ///
    /// Read-only and copy-out: looking at an account never materializes it.
    pub fn record(&self, address: &Address) -> AccountRecord {
        self.accounts.get(address).copied().unwrap_or_default()
    }

    /// The stored record for `address`, if it has been materialized.
    pub fn get(&self, address: &Address) -> Option<&AccountRecord> {
        self.accounts.get(address)
    }

    /// Mutable access to `address`, materializing the implicit `{0, 0}`
    /// record on first touch.
    pub fn materialize(&mut self, address: Address) -> &mut AccountRecord {
        self.accounts.entry(address).or_default()
    }

    /// Number of materialized accounts.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// `true` if no account has been materialized.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Iterate over all materialized `(address, record)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &AccountRecord)> {
        self.accounts.iter()
    }

    /// Sum of all balances, widened to avoid overflow.
    ///
    /// Transfers move value but never create or destroy it, so this sum is
    /// invariant under any sequence of applied transactions.
    pub fn total_balance(&self) -> u128 {
        self.accounts.values().map(|r| r.balance as u128).sum()
    }
}

impl Default for LedgerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Wallet;

    #[test]
    fn absent_account_is_implicitly_zero() {
        let ledger = LedgerState::new();
        let addr = Wallet::from_seed(&[1u8; 32]).address();
        assert_eq!(ledger.record(&addr), AccountRecord::default());
        // Reading does not materialize.
        assert!(ledger.is_empty());
    }

    #[test]
    fn materialize_creates_the_record_once() {
        let mut ledger = LedgerState::new();
        let addr = Wallet::from_seed(&[1u8; 32]).address();

        ledger.materialize(addr).balance = 50;
        assert_eq!(ledger.len(), 1);

        // A second touch finds the same record.
        assert_eq!(ledger.materialize(addr).balance, 50);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn genesis_copies_are_independent() {
        let alice = Wallet::from_seed(&[1u8; 32]).address();
        let mut genesis = Genesis::new();
        genesis.fund(alice, 100);

        let mut a = genesis.ledger();
        let b = genesis.ledger();

        a.materialize(alice).balance = 1;
        assert_eq!(a.record(&alice).balance, 1);
        assert_eq!(b.record(&alice).balance, 100, "copies must not alias");
    }

    #[test]
    fn total_balance_sums_everything() {
        let mut genesis = Genesis::new();
        for i in 1..=4u8 {
            genesis.fund(Wallet::from_seed(&[i; 32]).address(), 100);
        }
        assert_eq!(genesis.ledger().total_balance(), 400);
    }
}
