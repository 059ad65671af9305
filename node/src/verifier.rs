//! Transaction admission: the full check pipeline between a `/submit` body
//! and the mempool. Checks run in a fixed order so clients see stable error
//! codes: well-formedness, key/address binding, signature, uniqueness,
//! nonce, balance.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use dytallix_pqc::{PqcAlgorithm, PqcVerifyError};

use crate::addr;
use crate::config::NodeConfig;
use crate::mempool::{Mempool, MempoolError};
use crate::state::State;
use crate::storage::tx::{parse_amount, Transaction};
use crate::storage::Storage;

pub const DENOM_DGT: &str = "DGT";
pub const DENOM_DRT: &str = "DRT";
pub const DENOM_NATIVE: &str = "native";

fn default_denom() -> String {
    DENOM_NATIVE.to_string()
}

fn default_algorithm() -> String {
    PqcAlgorithm::default().as_str().to_string()
}

/// Wire shape of a `/submit` body.
#[derive(Debug, Deserialize)]
pub struct SubmitTx {
    pub from: String,
    pub to: String,
    #[serde(default = "default_denom")]
    pub denom: String,
    pub amount: String,
    pub fee: String,
    pub nonce: Option<u64>,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub memo: String,
}

#[derive(Error, Debug, PartialEq)]
pub enum AdmissionError {
    #[error("malformed transaction: {0}")]
    Malformed(String),
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("public key does not derive the sender address")]
    AddressMismatch,
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("duplicate transaction")]
    Duplicate,
    #[error("mempool full")]
    MempoolFull,
    #[error("feature not compiled: {0}")]
    FeatureNotCompiled(String),
}

impl From<PqcVerifyError> for AdmissionError {
    fn from(e: PqcVerifyError) -> Self {
        match e {
            PqcVerifyError::UnsupportedAlgorithm(a) => AdmissionError::UnknownAlgorithm(a),
            PqcVerifyError::InvalidPublicKey { details, .. } => {
                AdmissionError::InvalidPublicKey(details)
            }
            PqcVerifyError::InvalidSignature { details, .. } => {
                AdmissionError::InvalidSignature(details)
            }
            PqcVerifyError::VerificationFailed { .. } => {
                AdmissionError::InvalidSignature("verification failed".into())
            }
            PqcVerifyError::FeatureNotCompiled { feature } => {
                AdmissionError::FeatureNotCompiled(feature)
            }
        }
    }
}

fn normalize_denom(denom: &str) -> Result<String, AdmissionError> {
    let up = denom.to_ascii_uppercase();
    if up == DENOM_DGT || up == DENOM_DRT {
        return Ok(up);
    }
    if denom.eq_ignore_ascii_case(DENOM_NATIVE) {
        return Ok(DENOM_NATIVE.to_string());
    }
    Err(AdmissionError::Malformed(format!(
        "unsupported denom: {denom}; valid: DGT, DRT, native"
    )))
}

fn check_address(address: &str, hrp: &str, mocks: bool) -> Result<(), AdmissionError> {
    // Mock mode enforces only the prefix; dev fixture addresses carry no
    // valid checksum.
    let ok = if mocks {
        address.starts_with(&format!("{hrp}1"))
    } else {
        addr::validate(address, hrp)
    };
    if ok {
        Ok(())
    } else {
        Err(AdmissionError::Malformed(format!("invalid address: {address}")))
    }
}

/// Run the full admission pipeline and, on success, insert the transaction
/// into the mempool. Returns the canonical transaction (hash populated).
pub fn verify_and_admit(
    body: SubmitTx,
    storage: &Storage,
    state: &mut State,
    mempool: &mut Mempool,
    cfg: &NodeConfig,
) -> Result<Transaction, AdmissionError> {
    // 1. Well-formedness.
    let denom = normalize_denom(&body.denom)?;
    let amount = parse_amount(&body.amount).map_err(AdmissionError::Malformed)?;
    let fee = parse_amount(&body.fee).map_err(AdmissionError::Malformed)?;
    check_address(&body.from, &cfg.hrp, cfg.runtime_mocks)?;
    check_address(&body.to, &cfg.hrp, cfg.runtime_mocks)?;
    let algorithm = PqcAlgorithm::from_str(&body.algorithm)?;

    let expected_nonce = state.nonce_of(&body.from);
    let nonce = body.nonce.unwrap_or(expected_nonce);

    let mut tx = Transaction {
        hash: String::new(),
        from: body.from,
        to: body.to,
        denom,
        amount,
        fee,
        nonce,
        algorithm: algorithm.as_str().to_string(),
        public_key: body.public_key,
        signature: body.signature,
        memo: body.memo,
    };
    tx.hash = tx.compute_hash();

    if cfg.runtime_mocks {
        warn!(hash = %tx.hash, "RUNTIME_MOCKS enabled: skipping signature and address binding checks");
    } else {
        // 2. The public key must derive the sender address.
        let pk_bytes = B64
            .decode(&tx.public_key)
            .map_err(|e| AdmissionError::InvalidPublicKey(format!("invalid base64: {e}")))?;
        let derived = addr::derive(&pk_bytes, &cfg.hrp)
            .map_err(|e| AdmissionError::InvalidPublicKey(e.to_string()))?;
        if derived != tx.from {
            return Err(AdmissionError::AddressMismatch);
        }

        // 3. Signature over the canonical body bytes.
        let sig_bytes = B64
            .decode(&tx.signature)
            .map_err(|e| AdmissionError::InvalidSignature(format!("invalid base64: {e}")))?;
        dytallix_pqc::verify(algorithm, &pk_bytes, &tx.canonical_bytes(), &sig_bytes)?;
    }

    // 4. Network-wide hash uniqueness.
    if storage.has_tx(&tx.hash) || mempool.contains(&tx.hash) {
        return Err(AdmissionError::Duplicate);
    }

    // 5. Nonce must match the sender's current nonce (no gap queue).
    if nonce != expected_nonce {
        return Err(AdmissionError::InvalidNonce { expected: expected_nonce, got: nonce });
    }

    // 6. Best-effort balance precheck; authoritative check is at inclusion.
    if state.balance_of(&tx.from) < amount.saturating_add(fee) {
        return Err(AdmissionError::InsufficientBalance);
    }

    mempool.admit(tx.clone()).map_err(|e| match e {
        MempoolError::Duplicate => AdmissionError::Duplicate,
        MempoolError::Full => AdmissionError::MempoolFull,
    })?;
    Ok(tx)
}
