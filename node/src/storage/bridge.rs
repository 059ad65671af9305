use std::collections::{HashMap, HashSet};

use rocksdb::{WriteBatch, DB};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::tx::as_str_u128;
use crate::crypto::verify_ed25519_b64;

// Persistent bridge store
// Keys:
// bridge:halted -> 0|1
// bridge:validators -> JSON array of BridgeValidator { id, pubkey }
// bridge:custody:{asset} -> u128 (bincode)
// bridge:pending:{id} -> JSON BridgeMessage
// bridge:applied:{id} -> JSON BridgeMessage

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeValidator {
    pub id: String,
    pub pubkey: String, // base64 ed25519
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeMessage {
    pub id: String,
    pub source_chain: String,
    pub dest_chain: String,
    pub asset: String,
    #[serde(with = "as_str_u128")]
    pub amount: u128,
    pub recipient: String,
    pub signatures: Vec<String>, // base64, parallel to signers
    pub signers: Vec<String>,    // validator ids
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStateDebug {
    pub halted: bool,
    pub validators: Vec<BridgeValidator>,
    pub custody: HashMap<String, String>,
    pub pending: Vec<String>,
    pub applied: Vec<String>,
}

#[derive(Error, Debug, PartialEq)]
pub enum BridgeError {
    #[error("bridge is halted")]
    Halted,
    #[error("signers/signatures length mismatch")]
    LengthMismatch,
    #[error("unknown validator: {0}")]
    UnknownValidator(String),
    #[error("invalid signature from validator: {0}")]
    InvalidSignature(String),
    #[error("insufficient quorum: {valid} valid of {needed} needed")]
    InsufficientQuorum { valid: usize, needed: usize },
}

/// Canonical payload signed by bridge validators. The single definition is
/// shared by the verifier here and by the signing tooling.
pub fn canonical_payload(msg: &BridgeMessage) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}",
        msg.id, msg.source_chain, msg.dest_chain, msg.asset, msg.amount, msg.recipient
    )
}

/// Number of distinct valid signers required: ceil(2/3 of the set).
pub fn quorum_threshold(validator_count: usize) -> usize {
    (2 * validator_count + 2) / 3
}

/// Check a bridge message against the validator set: every provided
/// signature must be a valid ed25519 signature by the named, registered
/// validator, and distinct valid signers must reach the quorum threshold.
pub fn verify_bridge_message(
    msg: &BridgeMessage,
    validators: &[BridgeValidator],
) -> Result<(), BridgeError> {
    if msg.signatures.len() != msg.signers.len() {
        return Err(BridgeError::LengthMismatch);
    }
    let needed = quorum_threshold(validators.len()).max(1);
    let by_id: HashMap<&str, &str> = validators
        .iter()
        .map(|v| (v.id.as_str(), v.pubkey.as_str()))
        .collect();
    let payload = canonical_payload(msg);
    let mut unique_signers = HashSet::new();
    for (signer, sig) in msg.signers.iter().zip(&msg.signatures) {
        let pubkey = by_id
            .get(signer.as_str())
            .ok_or_else(|| BridgeError::UnknownValidator(signer.clone()))?;
        if !verify_ed25519_b64(pubkey, payload.as_bytes(), sig) {
            return Err(BridgeError::InvalidSignature(signer.clone()));
        }
        unique_signers.insert(signer.as_str());
    }
    if unique_signers.len() < needed {
        return Err(BridgeError::InsufficientQuorum { valid: unique_signers.len(), needed });
    }
    Ok(())
}

pub struct BridgeStore<'a> {
    pub db: &'a DB,
}

impl<'a> BridgeStore<'a> {
    fn key_halted() -> &'static str {
        "bridge:halted"
    }
    fn key_validators() -> &'static str {
        "bridge:validators"
    }
    fn key_custody(asset: &str) -> String {
        format!("bridge:custody:{asset}")
    }
    fn key_pending(id: &str) -> String {
        format!("bridge:pending:{id}")
    }
    fn key_applied(id: &str) -> String {
        format!("bridge:applied:{id}")
    }

    pub fn is_halted(&self) -> bool {
        self.db
            .get(Self::key_halted())
            .ok()
            .flatten()
            .map(|v| v == b"1")
            .unwrap_or(false)
    }

    pub fn set_halted(&self, halted: bool) -> anyhow::Result<()> {
        self.db
            .put(Self::key_halted(), if halted { b"1" } else { b"0" })?;
        Ok(())
    }

    pub fn get_validators(&self) -> Vec<BridgeValidator> {
        self.db
            .get(Self::key_validators())
            .ok()
            .flatten()
            .and_then(|v| serde_json::from_slice(&v).ok())
            .unwrap_or_default()
    }

    pub fn set_validators(&self, vals: &[BridgeValidator]) -> anyhow::Result<()> {
        self.db
            .put(Self::key_validators(), serde_json::to_vec(vals)?)?;
        Ok(())
    }

    pub fn get_custody(&self, asset: &str) -> u128 {
        self.db
            .get(Self::key_custody(asset))
            .ok()
            .flatten()
            .and_then(|v| bincode::deserialize(&v).ok())
            .unwrap_or(0)
    }

    pub fn has_message(&self, id: &str) -> bool {
        self.db.get(Self::key_pending(id)).ok().flatten().is_some()
            || self.db.get(Self::key_applied(id)).ok().flatten().is_some()
    }

    /// Apply an accepted message: bump custody and move it to the applied
    /// table (clearing any pending entry) in one atomic batch.
    pub fn apply(&self, msg: &BridgeMessage) -> anyhow::Result<u128> {
        let new_custody = self.get_custody(&msg.asset).saturating_add(msg.amount);
        let mut batch = WriteBatch::default();
        batch.put(Self::key_custody(&msg.asset), bincode::serialize(&new_custody)?);
        batch.put(Self::key_applied(&msg.id), serde_json::to_vec(msg)?);
        batch.delete(Self::key_pending(&msg.id));
        self.db.write(batch)?;
        Ok(new_custody)
    }

    pub fn list_pending(&self) -> Vec<String> {
        self.list_ids(b"bridge:pending:")
    }

    pub fn list_applied(&self) -> Vec<String> {
        self.list_ids(b"bridge:applied:")
    }

    fn list_ids(&self, prefix: &[u8]) -> Vec<String> {
        let mut out = vec![];
        for kv in self.db.prefix_iterator(prefix).flatten() {
            if !kv.0.starts_with(prefix) {
                break;
            }
            if let Ok(key) = std::str::from_utf8(&kv.0) {
                if let Some(id) = key.rsplit(':').next() {
                    out.push(id.to_string());
                }
            }
        }
        out
    }

    pub fn build_debug_state(&self) -> BridgeStateDebug {
        let mut custody = HashMap::new();
        let prefix = b"bridge:custody:";
        for kv in self.db.prefix_iterator(prefix).flatten() {
            if !kv.0.starts_with(prefix) {
                break;
            }
            if let Ok(key) = std::str::from_utf8(&kv.0) {
                if let Some(asset) = key.strip_prefix("bridge:custody:") {
                    if let Ok(v) = bincode::deserialize::<u128>(&kv.1) {
                        custody.insert(asset.to_string(), v.to_string());
                    }
                }
            }
        }
        BridgeStateDebug {
            halted: self.is_halted(),
            validators: self.get_validators(),
            custody,
            pending: self.list_pending(),
            applied: self.list_applied(),
        }
    }
}

/// Load the validator set from `BRIDGE_VALIDATORS` on first boot only; once
/// persisted the env value is ignored.
pub fn ensure_bridge_validators(db: &DB) -> anyhow::Result<()> {
    let store = BridgeStore { db };
    if store.get_validators().is_empty() {
        if let Ok(raw) = std::env::var("BRIDGE_VALIDATORS") {
            let vals: Vec<BridgeValidator> = serde_json::from_str(&raw)?;
            store.set_validators(&vals)?;
        }
    }
    Ok(())
}
