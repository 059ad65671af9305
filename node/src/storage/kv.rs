use std::path::PathBuf;

use rocksdb::{Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::blocks::{Block, GENESIS_PARENT};
use super::receipts::TxReceipt;
use super::tx::Transaction;

/// Key builders, one per table. No ad-hoc key format strings at call sites.
pub mod keys {
    pub const META_CHAIN_ID: &str = "meta:chain_id";
    pub const META_HEIGHT: &str = "meta:height";
    pub const META_BEST_HASH: &str = "meta:best_hash";

    pub fn acct(addr: &str) -> String {
        format!("acct:{addr}")
    }
    pub fn blk_hash(hash: &str) -> String {
        format!("blk_hash:{hash}")
    }
    pub fn blk_num(height: u64) -> String {
        format!("blk_num:{height:016x}")
    }
    pub fn tx(hash: &str) -> String {
        format!("tx:{hash}")
    }
    pub fn rcpt(hash: &str) -> String {
        format!("rcpt:{hash}")
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("kv store error: {0}")]
    Db(#[from] rocksdb::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AccountRecord {
    pub balance: u128,
    pub nonce: u64,
}

/// RocksDB-backed persistence. One database, string-prefixed keys; every
/// multi-key mutation (genesis, block commit, bridge apply) goes through a
/// single atomic `WriteBatch`.
pub struct Storage {
    pub db: DB,
}

impl Storage {
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    // ── Accounts ────────────────────────────────────────────────────────────

    pub fn get_account(&self, addr: &str) -> Option<AccountRecord> {
        self.db
            .get(keys::acct(addr))
            .ok()
            .flatten()
            .and_then(|b| bincode::deserialize(&b).ok())
    }

    // ── Chain meta ──────────────────────────────────────────────────────────

    pub fn chain_id(&self) -> Option<String> {
        self.db
            .get(keys::META_CHAIN_ID)
            .ok()
            .flatten()
            .map(|v| String::from_utf8_lossy(&v).to_string())
    }

    /// Whether genesis has run (height 0 persisted).
    pub fn is_initialized(&self) -> bool {
        self.db.get(keys::META_HEIGHT).ok().flatten().is_some()
    }

    pub fn height(&self) -> u64 {
        self.db
            .get(keys::META_HEIGHT)
            .ok()
            .flatten()
            .and_then(|v| {
                if v.len() == 8 {
                    let mut arr = [0u8; 8];
                    arr.copy_from_slice(&v);
                    Some(u64::from_be_bytes(arr))
                } else {
                    None
                }
            })
            .unwrap_or(0)
    }

    pub fn best_hash(&self) -> String {
        self.db
            .get(keys::META_BEST_HASH)
            .ok()
            .flatten()
            .map(|v| String::from_utf8_lossy(&v).to_string())
            .unwrap_or_else(|| GENESIS_PARENT.to_string())
    }

    // ── Blocks ──────────────────────────────────────────────────────────────

    pub fn get_block_by_height(&self, h: u64) -> Option<Block> {
        let hash = self.db.get(keys::blk_num(h)).ok().flatten()?;
        self.get_block_by_hash(&String::from_utf8_lossy(&hash))
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Option<Block> {
        self.db
            .get(keys::blk_hash(hash))
            .ok()
            .flatten()
            .and_then(|b| bincode::deserialize(&b).ok())
    }

    // ── Transactions & receipts ─────────────────────────────────────────────

    pub fn put_tx(&self, tx: &Transaction) -> Result<(), StorageError> {
        self.db.put(keys::tx(&tx.hash), bincode::serialize(tx)?)?;
        Ok(())
    }

    pub fn has_tx(&self, hash: &str) -> bool {
        self.db.get(keys::tx(hash)).ok().flatten().is_some()
    }

    pub fn get_tx(&self, hash: &str) -> Option<Transaction> {
        self.db
            .get(keys::tx(hash))
            .ok()
            .flatten()
            .and_then(|b| bincode::deserialize(&b).ok())
    }

    pub fn put_pending_receipt(&self, r: &TxReceipt) -> Result<(), StorageError> {
        self.db.put(keys::rcpt(&r.tx_hash), bincode::serialize(r)?)?;
        Ok(())
    }

    pub fn get_receipt(&self, hash: &str) -> Option<TxReceipt> {
        self.db
            .get(keys::rcpt(hash))
            .ok()
            .flatten()
            .and_then(|b| bincode::deserialize(&b).ok())
    }

    // ── Atomic commits ──────────────────────────────────────────────────────

    /// Persist the genesis state: chain id, initial balances and height 0,
    /// in one batch. Never re-applied once `meta:height` exists.
    pub fn commit_genesis(
        &self,
        chain_id: &str,
        accounts: &[(String, AccountRecord)],
    ) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        batch.put(keys::META_CHAIN_ID, chain_id.as_bytes());
        for (addr, acct) in accounts {
            batch.put(keys::acct(addr), bincode::serialize(acct)?);
        }
        batch.put(keys::META_HEIGHT, 0u64.to_be_bytes());
        self.db.write(batch)?;
        Ok(())
    }

    /// Persist one produced block: touched accounts, the block under both
    /// indexes, every included transaction, every receipt (success and
    /// failed-at-inclusion) and the advanced chain meta, atomically.
    pub fn commit_block(
        &self,
        block: &Block,
        txs: &[Transaction],
        receipts: &[TxReceipt],
        accounts: &[(String, AccountRecord)],
    ) -> Result<(), StorageError> {
        let mut batch = WriteBatch::default();
        for (addr, acct) in accounts {
            batch.put(keys::acct(addr), bincode::serialize(acct)?);
        }
        batch.put(keys::blk_hash(&block.hash), bincode::serialize(block)?);
        batch.put(keys::blk_num(block.header.height), block.hash.as_bytes());
        for tx in txs {
            batch.put(keys::tx(&tx.hash), bincode::serialize(tx)?);
        }
        for r in receipts {
            batch.put(keys::rcpt(&r.tx_hash), bincode::serialize(r)?);
        }
        batch.put(keys::META_HEIGHT, block.header.height.to_be_bytes());
        batch.put(keys::META_BEST_HASH, block.hash.as_bytes());
        self.db.write(batch)?;
        Ok(())
    }
}
