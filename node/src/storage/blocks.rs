use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Parent value of the first block.
pub const GENESIS_PARENT: &str = "genesis";

/// Proposer recorded while the chain runs with a single producer.
pub const SINGLE_PROPOSER: &str = "single";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockHeader {
    pub height: u64,
    pub parent: String,
    pub timestamp: i64,
    pub proposer: String,
    pub tx_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub header: BlockHeader,
    pub tx_hashes: Vec<String>,
    pub hash: String,
}

impl Block {
    /// sha256 over height (be8), parent bytes, timestamp (be8) and the
    /// ordered tx hashes.
    pub fn compute_hash(header: &BlockHeader, tx_hashes: &[String]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(header.height.to_be_bytes());
        hasher.update(header.parent.as_bytes());
        hasher.update(header.timestamp.to_be_bytes());
        for h in tx_hashes {
            hasher.update(h.as_bytes());
        }
        format!("0x{:x}", hasher.finalize())
    }

    pub fn new(height: u64, parent: String, timestamp: i64, tx_hashes: Vec<String>) -> Self {
        let header = BlockHeader {
            height,
            parent,
            timestamp,
            proposer: SINGLE_PROPOSER.to_string(),
            tx_count: tx_hashes.len() as u32,
        };
        let hash = Self::compute_hash(&header, &tx_hashes);
        Self { header, tx_hashes, hash }
    }
}

// Rolling TPS helper (ring buffer of (timestamp, tx_count)) feeding /stats.
#[derive(Default)]
pub struct TpsWindow {
    pub entries: std::collections::VecDeque<(i64, u32)>,
    pub window_secs: i64,
}

impl TpsWindow {
    pub fn new(window_secs: i64) -> Self {
        Self { entries: std::collections::VecDeque::new(), window_secs }
    }

    pub fn record_block(&mut self, ts: i64, txs: u32) {
        self.entries.push_back((ts, txs));
        self.evict(ts);
    }

    fn evict(&mut self, now: i64) {
        while let Some((t, _)) = self.entries.front() {
            if now.saturating_sub(*t) > self.window_secs {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn rolling_tps(&mut self, now: i64) -> f64 {
        self.evict(now);
        let total_txs: u64 = self.entries.iter().map(|(_, c)| *c as u64).sum();
        let span = self.window_secs.max(1);
        (total_txs as f64) / (span as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hash_commits_to_contents() {
        let b1 = Block::new(1, GENESIS_PARENT.into(), 1000, vec!["0xaa".into()]);
        let b2 = Block::new(1, GENESIS_PARENT.into(), 1000, vec!["0xbb".into()]);
        let b3 = Block::new(2, GENESIS_PARENT.into(), 1000, vec!["0xaa".into()]);
        assert_ne!(b1.hash, b2.hash);
        assert_ne!(b1.hash, b3.hash);
        assert_eq!(
            b1.hash,
            Block::new(1, GENESIS_PARENT.into(), 1000, vec!["0xaa".into()]).hash
        );
    }

    #[test]
    fn header_counts_txs() {
        let b = Block::new(5, "0xparent".into(), 42, vec!["0x1".into(), "0x2".into()]);
        assert_eq!(b.header.tx_count, 2);
        assert_eq!(b.header.proposer, SINGLE_PROPOSER);
    }

    #[test]
    fn tps_window_evicts_old_entries() {
        let mut w = TpsWindow::new(60);
        w.record_block(0, 120);
        w.record_block(30, 60);
        assert_eq!(w.rolling_tps(30), 3.0);
        // First entry falls out of the window.
        assert_eq!(w.rolling_tps(85), 1.0);
    }
}
