//! Boot sequence: chain-id guard first, then one-shot genesis application.
//! The producer constructor requires the [`Booted`] token this module
//! returns, so the node cannot start producing against an unguarded store.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NodeConfig;
use crate::storage::tx::parse_amount;
use crate::storage::{AccountRecord, Storage, StorageError};

#[derive(Debug, Deserialize)]
pub struct GenesisFile {
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default, alias = "allocations")]
    pub dgt_allocations: Vec<GenesisAllocation>,
}

#[derive(Debug, Deserialize)]
pub struct GenesisAllocation {
    pub address: String,
    #[serde(deserialize_with = "de_amount")]
    pub amount: u128,
}

// Genesis files in the wild carry amounts both as JSON numbers and as the
// decimal strings the wire format uses; accept either.
fn de_amount<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
    match serde_json::Value::deserialize(d)? {
        serde_json::Value::String(s) => parse_amount(&s).map_err(serde::de::Error::custom),
        serde_json::Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| serde::de::Error::custom("amount must be a non-negative integer")),
        other => Err(serde::de::Error::custom(format!(
            "amount must be a string or number, got {other}"
        ))),
    }
}

#[derive(Error, Debug)]
pub enum BootError {
    #[error("chain id mismatch: stored {stored}, configured {configured}")]
    ChainIdMismatch { stored: String, configured: String },
    #[error("genesis error: {0}")]
    Genesis(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Proof that the chain-id guard ran and genesis is in place. Required by
/// the producer.
pub struct Booted {
    pub chain_id: String,
}

/// Enforce chain-id continuity and apply genesis exactly once.
pub fn ensure_booted(storage: &Storage, cfg: &NodeConfig) -> Result<Booted, BootError> {
    if let Some(stored) = storage.chain_id() {
        if stored != cfg.chain_id {
            return Err(BootError::ChainIdMismatch {
                stored,
                configured: cfg.chain_id.clone(),
            });
        }
    }

    if !storage.is_initialized() {
        let accounts = load_allocations(cfg)?;
        let total: u128 = accounts.iter().map(|(_, a)| a.balance).sum();
        storage.commit_genesis(&cfg.chain_id, &accounts)?;
        info!(
            chain_id = %cfg.chain_id,
            accounts = accounts.len(),
            total_allocated = %total,
            "genesis applied at height 0"
        );
    }

    Ok(Booted { chain_id: cfg.chain_id.clone() })
}

fn load_allocations(cfg: &NodeConfig) -> Result<Vec<(String, AccountRecord)>, BootError> {
    let path = Path::new(&cfg.genesis_file);
    if !path.exists() {
        warn!(file = %cfg.genesis_file, "genesis file not found; starting with empty allocations");
        return Ok(vec![]);
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| BootError::Genesis(format!("cannot read {}: {e}", cfg.genesis_file)))?;
    let genesis: GenesisFile = serde_json::from_str(&raw)
        .map_err(|e| BootError::Genesis(format!("cannot parse {}: {e}", cfg.genesis_file)))?;
    if let Some(file_chain_id) = &genesis.chain_id {
        if *file_chain_id != cfg.chain_id {
            return Err(BootError::Genesis(format!(
                "genesis file is for chain {file_chain_id}, node configured for {}",
                cfg.chain_id
            )));
        }
    }
    let mut balances: HashMap<String, u128> = HashMap::new();
    for alloc in &genesis.dgt_allocations {
        let entry = balances.entry(alloc.address.clone()).or_default();
        *entry = entry.saturating_add(alloc.amount);
    }
    let mut accounts: Vec<(String, AccountRecord)> = balances
        .into_iter()
        .map(|(addr, balance)| (addr, AccountRecord { balance, nonce: 0 }))
        .collect();
    accounts.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_genesis(dir: &Path, body: &str) -> String {
        let path = dir.join("genesisBlock.json");
        std::fs::write(&path, body).unwrap();
        path.to_string_lossy().to_string()
    }

    fn cfg_with(genesis_file: String) -> NodeConfig {
        NodeConfig { genesis_file, ..NodeConfig::default() }
    }

    #[test]
    fn genesis_seeds_balances_once() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("node.db")).unwrap();
        let genesis_file = write_genesis(
            dir.path(),
            r#"{"chain_id":"dyt-local-1","dgt_allocations":[
                {"address":"dyt1alice","amount":"1000"},
                {"address":"dyt1bob","amount":0}
            ]}"#,
        );
        let cfg = cfg_with(genesis_file);
        let booted = ensure_booted(&storage, &cfg).unwrap();
        assert_eq!(booted.chain_id, "dyt-local-1");
        assert_eq!(storage.get_account("dyt1alice").unwrap().balance, 1000);
        assert_eq!(storage.height(), 0);

        // Re-boot must not re-apply allocations.
        ensure_booted(&storage, &cfg).unwrap();
        assert_eq!(storage.get_account("dyt1alice").unwrap().balance, 1000);
    }

    #[test]
    fn chain_id_guard_aborts_before_mutation() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("node.db")).unwrap();
        let genesis_file = write_genesis(
            dir.path(),
            r#"{"chain_id":"dyt-local-1","dgt_allocations":[{"address":"dyt1alice","amount":"7"}]}"#,
        );
        ensure_booted(&storage, &cfg_with(genesis_file.clone())).unwrap();

        let wrong = NodeConfig {
            chain_id: "dyt-local-2".into(),
            genesis_file,
            ..NodeConfig::default()
        };
        match ensure_booted(&storage, &wrong) {
            Err(BootError::ChainIdMismatch { stored, configured }) => {
                assert_eq!(stored, "dyt-local-1");
                assert_eq!(configured, "dyt-local-2");
            }
            other => panic!("expected ChainIdMismatch, got {:?}", other.map(|b| b.chain_id)),
        }
        // No mutation happened.
        assert_eq!(storage.chain_id().as_deref(), Some("dyt-local-1"));
        assert_eq!(storage.get_account("dyt1alice").unwrap().balance, 7);
    }

    #[test]
    fn genesis_chain_id_must_match_config() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("node.db")).unwrap();
        let genesis_file = write_genesis(
            dir.path(),
            r#"{"chain_id":"dyt-mainnet-1","dgt_allocations":[]}"#,
        );
        assert!(matches!(
            ensure_booted(&storage, &cfg_with(genesis_file)),
            Err(BootError::Genesis(_))
        ));
    }

    #[test]
    fn duplicate_allocations_accumulate() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("node.db")).unwrap();
        let genesis_file = write_genesis(
            dir.path(),
            r#"{"chain_id":"dyt-local-1","allocations":[
                {"address":"dyt1alice","amount":"10"},
                {"address":"dyt1alice","amount":"5"}
            ]}"#,
        );
        ensure_booted(&storage, &cfg_with(genesis_file)).unwrap();
        assert_eq!(storage.get_account("dyt1alice").unwrap().balance, 15);
    }

    #[test]
    fn missing_file_boots_empty() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("node.db")).unwrap();
        let cfg = cfg_with(dir.path().join("absent.json").to_string_lossy().to_string());
        ensure_booted(&storage, &cfg).unwrap();
        assert!(storage.is_initialized());
        assert_eq!(storage.height(), 0);
    }

    #[test]
    fn malformed_file_is_fatal() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path().join("node.db")).unwrap();
        let genesis_file = write_genesis(dir.path(), "{not json");
        assert!(matches!(
            ensure_booted(&storage, &cfg_with(genesis_file)),
            Err(BootError::Genesis(_))
        ));
        assert!(!storage.is_initialized());
    }
}
