use rocksdb::DB;
use serde::{Deserialize, Serialize};

/// AI risk score attached to a transaction hash, one record per hash.
/// `score_str` keeps the exact decimal text the oracle signed so the
/// `"{tx_hash}:{score}"` signature message can be reproduced bit-for-bit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiRiskRecord {
    pub tx_hash: String,
    pub score: f64,
    pub score_str: String,
    pub signature: Option<String>,
    pub oracle_pubkey: Option<String>,
}

pub struct OracleStore<'a> {
    pub db: &'a DB,
}

impl<'a> OracleStore<'a> {
    fn key(tx_hash: &str) -> String {
        format!("oracle:ai:{tx_hash}")
    }

    pub fn put_ai_risk(&self, rec: &AiRiskRecord) -> anyhow::Result<()> {
        if !rec.tx_hash.starts_with("0x") || rec.tx_hash.len() < 3 {
            anyhow::bail!("invalid tx_hash format: {}", rec.tx_hash);
        }
        if !(0.0..=1.0).contains(&rec.score) {
            anyhow::bail!("score must be between 0.0 and 1.0");
        }
        self.db.put(Self::key(&rec.tx_hash), serde_json::to_vec(rec)?)?;
        Ok(())
    }

    pub fn get_ai_risk(&self, tx_hash: &str) -> Option<AiRiskRecord> {
        self.db
            .get(Self::key(tx_hash))
            .ok()
            .flatten()
            .and_then(|v| serde_json::from_slice(&v).ok())
    }
}
