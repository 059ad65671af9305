use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;

use crate::storage::{AccountRecord, Storage};

#[derive(Error, Debug, PartialEq)]
pub enum StateError {
    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: u128, available: u128 },
}

/// Snapshot of the hot account view, taken before a block's mutations so a
/// failed commit can be rolled back without observable effect.
pub struct StateSnapshot {
    accounts: HashMap<String, AccountRecord>,
    dirty: HashSet<String>,
}

/// In-memory hot view of accounts with lazy read-through from the KV store.
/// Mutation happens only inside the producer; persistence only at block
/// commit, via the dirty set folded into the commit batch.
pub struct State {
    accounts: HashMap<String, AccountRecord>,
    dirty: HashSet<String>,
    storage: Arc<Storage>,
}

impl State {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { accounts: HashMap::new(), dirty: HashSet::new(), storage }
    }

    /// Current account, defaulting to `{0, 0}` for unknown addresses.
    pub fn get_account(&mut self, addr: &str) -> AccountRecord {
        if let Some(a) = self.accounts.get(addr) {
            return *a;
        }
        let a = self.storage.get_account(addr).unwrap_or_default();
        self.accounts.insert(addr.to_string(), a);
        a
    }

    pub fn balance_of(&mut self, addr: &str) -> u128 {
        self.get_account(addr).balance
    }

    pub fn nonce_of(&mut self, addr: &str) -> u64 {
        self.get_account(addr).nonce
    }

    /// Debit `amount + fee` from the sender and credit `amount` to the
    /// recipient. The fee has no credit destination: it is burned.
    pub fn apply_transfer(
        &mut self,
        from: &str,
        to: &str,
        amount: u128,
        fee: u128,
    ) -> Result<(), StateError> {
        let needed = amount.saturating_add(fee);
        let mut sender = self.get_account(from);
        if sender.balance < needed {
            return Err(StateError::InsufficientBalance { needed, available: sender.balance });
        }
        sender.balance -= needed;
        self.put(from, sender);
        let mut recipient = self.get_account(to);
        recipient.balance = recipient.balance.saturating_add(amount);
        self.put(to, recipient);
        Ok(())
    }

    pub fn incr_nonce(&mut self, addr: &str) {
        let mut a = self.get_account(addr);
        a.nonce += 1;
        self.put(addr, a);
    }

    /// Credit without a debit side; genesis allocations only.
    pub fn credit(&mut self, addr: &str, amount: u128) {
        let mut a = self.get_account(addr);
        a.balance = a.balance.saturating_add(amount);
        self.put(addr, a);
    }

    fn put(&mut self, addr: &str, acct: AccountRecord) {
        self.accounts.insert(addr.to_string(), acct);
        self.dirty.insert(addr.to_string());
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot { accounts: self.accounts.clone(), dirty: self.dirty.clone() }
    }

    pub fn restore(&mut self, snap: StateSnapshot) {
        self.accounts = snap.accounts;
        self.dirty = snap.dirty;
    }

    /// Accounts touched since the last commit, in deterministic order.
    pub fn dirty_accounts(&self) -> Vec<(String, AccountRecord)> {
        let mut out: Vec<_> = self
            .dirty
            .iter()
            .filter_map(|addr| self.accounts.get(addr).map(|a| (addr.clone(), *a)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }
}
