use std::collections::{HashSet, VecDeque};

use crate::storage::tx::Transaction;

pub const DEFAULT_MAX_TXS: usize = 10_000;

#[derive(Debug, PartialEq, Eq)]
pub enum MempoolError {
    Duplicate,
    Full,
}

impl std::fmt::Display for MempoolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MempoolError::Duplicate => write!(f, "duplicate"),
            MempoolError::Full => write!(f, "full"),
        }
    }
}

impl std::error::Error for MempoolError {}

/// Bounded FIFO of admitted, not-yet-included transactions, deduplicated by
/// hash. No fee ordering: inclusion follows admission order.
pub struct Mempool {
    queue: VecDeque<Transaction>,
    hashes: HashSet<String>,
    capacity: usize,
}

impl Mempool {
    pub fn new() -> Self {
        let capacity = std::env::var("DYT_MEMPOOL_MAX_TXS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_TXS);
        Self::with_capacity(capacity)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { queue: VecDeque::new(), hashes: HashSet::new(), capacity }
    }

    /// Insert a verified transaction. The caller is responsible for having
    /// run full admission checks first.
    pub fn admit(&mut self, tx: Transaction) -> Result<(), MempoolError> {
        if self.hashes.contains(&tx.hash) {
            return Err(MempoolError::Duplicate);
        }
        if self.queue.len() >= self.capacity {
            return Err(MempoolError::Full);
        }
        self.hashes.insert(tx.hash.clone());
        self.queue.push_back(tx);
        Ok(())
    }

    /// Up to `max` transactions in insertion order, left in place until the
    /// block that takes them commits (`drop_hashes`).
    pub fn snapshot(&self, max: usize) -> Vec<Transaction> {
        self.queue.iter().take(max).cloned().collect()
    }

    /// Evict transactions after block commit, both included and
    /// failed-at-inclusion ones.
    pub fn drop_hashes(&mut self, hashes: &[String]) {
        let drop: HashSet<&str> = hashes.iter().map(|h| h.as_str()).collect();
        self.queue.retain(|tx| !drop.contains(tx.hash.as_str()));
        for h in hashes {
            self.hashes.remove(h);
        }
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.capacity
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(hash: &str) -> Transaction {
        Transaction {
            hash: hash.into(),
            from: "dyt1a".into(),
            to: "dyt1b".into(),
            denom: "DGT".into(),
            amount: 1,
            fee: 1,
            nonce: 0,
            algorithm: "dilithium3".into(),
            public_key: String::new(),
            signature: String::new(),
            memo: String::new(),
        }
    }

    #[test]
    fn fifo_order_preserved() {
        let mut mp = Mempool::with_capacity(10);
        for i in 0..5 {
            mp.admit(tx(&format!("0x{i}"))).unwrap();
        }
        let snap = mp.snapshot(3);
        let hashes: Vec<_> = snap.iter().map(|t| t.hash.as_str()).collect();
        assert_eq!(hashes, ["0x0", "0x1", "0x2"]);
    }

    #[test]
    fn duplicate_rejected() {
        let mut mp = Mempool::with_capacity(10);
        mp.admit(tx("0xsame")).unwrap();
        assert_eq!(mp.admit(tx("0xsame")), Err(MempoolError::Duplicate));
        assert_eq!(mp.len(), 1);
    }

    #[test]
    fn capacity_enforced() {
        let mut mp = Mempool::with_capacity(2);
        mp.admit(tx("0x1")).unwrap();
        mp.admit(tx("0x2")).unwrap();
        assert!(mp.is_full());
        assert_eq!(mp.admit(tx("0x3")), Err(MempoolError::Full));
    }

    #[test]
    fn snapshot_is_non_destructive_until_drop() {
        let mut mp = Mempool::with_capacity(10);
        mp.admit(tx("0x1")).unwrap();
        mp.admit(tx("0x2")).unwrap();
        assert_eq!(mp.snapshot(10).len(), 2);
        assert_eq!(mp.len(), 2);
        mp.drop_hashes(&["0x1".to_string()]);
        assert_eq!(mp.len(), 1);
        assert!(!mp.contains("0x1"));
        assert!(mp.contains("0x2"));
    }
}
