use serde::{Deserialize, Serialize};

use super::tx::{as_str_u128, Transaction};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub status: TxStatus,
    pub block_height: Option<u64>,
    pub index: Option<u32>,
    pub from: String,
    pub to: String,
    #[serde(with = "as_str_u128")]
    pub amount: u128,
    #[serde(with = "as_str_u128")]
    pub fee: u128,
    pub nonce: u64,
    pub error: Option<String>,
}

impl TxReceipt {
    /// Receipt written at admission, before inclusion.
    pub fn pending(tx: &Transaction) -> Self {
        Self {
            tx_hash: tx.hash.clone(),
            status: TxStatus::Pending,
            block_height: None,
            index: None,
            from: tx.from.clone(),
            to: tx.to.clone(),
            amount: tx.amount,
            fee: tx.fee,
            nonce: tx.nonce,
            error: None,
        }
    }

    /// Terminal receipt for a transaction rejected at inclusion time.
    pub fn failed(tx: &Transaction, error: impl Into<String>) -> Self {
        Self {
            status: TxStatus::Failed,
            error: Some(error.into()),
            ..Self::pending(tx)
        }
    }

    /// Terminal receipt for a transaction included in a block.
    pub fn success(tx: &Transaction, block_height: u64, index: u32) -> Self {
        Self {
            status: TxStatus::Success,
            block_height: Some(block_height),
            index: Some(index),
            ..Self::pending(tx)
        }
    }
}
