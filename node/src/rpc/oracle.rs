use axum::{Extension, Json};
use serde::{Deserialize, Deserializer};
use serde_json::json;

use crate::crypto::verify_ed25519_b64;
use crate::events::NodeEvent;
use crate::rpc::errors::ApiError;
use crate::rpc::RpcContext;
use crate::storage::oracle::{AiRiskRecord, OracleStore};
use crate::verifier::AdmissionError;

/// Score as it arrived on the wire: the parsed value plus the exact decimal
/// text the oracle signed. The signature message must be rebuilt from that
/// text, not from a re-rendering of the parsed float (`1.0` formats as `"1"`
/// in Rust). Accepts a JSON number or a string; clients send the string form
/// when their rendering differs from JSON's (e.g. trailing zeros).
#[derive(Debug, Clone, PartialEq)]
pub struct WireScore {
    pub value: f64,
    pub text: String,
}

impl<'de> Deserialize<'de> for WireScore {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(d)? {
            serde_json::Value::Number(n) => {
                let value = n
                    .as_f64()
                    .ok_or_else(|| serde::de::Error::custom("score must be a finite number"))?;
                Ok(WireScore { value, text: n.to_string() })
            }
            serde_json::Value::String(s) => {
                let value = s
                    .parse::<f64>()
                    .map_err(|e| serde::de::Error::custom(format!("invalid score: {e}")))?;
                Ok(WireScore { value, text: s })
            }
            other => Err(serde::de::Error::custom(format!(
                "score must be a number or a decimal string, got {other}"
            ))),
        }
    }
}

#[derive(Deserialize)]
pub struct OracleAiRiskInput {
    pub tx_hash: String,
    pub score: WireScore,
    pub signature: Option<String>,
}

#[derive(Deserialize)]
pub struct OracleAiRiskBatchInput {
    pub records: Vec<OracleAiRiskInput>,
}

/// Signature message for an AI risk post: ASCII `"{tx_hash}:{score}"` with
/// the score text exactly as received, shared between the oracle signer and
/// this check.
pub fn risk_message(tx_hash: &str, score_text: &str) -> String {
    format!("{tx_hash}:{score_text}")
}

// Public for unit testing
pub fn verify_sig(pubkey_b64: &str, tx_hash: &str, score_text: &str, sig_b64: &str) -> bool {
    verify_ed25519_b64(pubkey_b64, risk_message(tx_hash, score_text).as_bytes(), sig_b64)
}

#[axum::debug_handler]
pub async fn post_ai_risk(
    Extension(ctx): Extension<RpcContext>,
    Json(inp): Json<OracleAiRiskInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !(0.0..=1.0).contains(&inp.score.value) {
        return Err(AdmissionError::Malformed("score must be between 0.0 and 1.0".into()).into());
    }
    let configured_pk = ctx.cfg.ai_oracle_pubkey.clone();
    if let Some(pk) = configured_pk.as_ref() {
        // Configured oracle key: a valid signature is mandatory.
        let sig = inp.signature.as_ref().ok_or_else(|| {
            ApiError::Admission(AdmissionError::InvalidSignature(
                "oracle signature required".into(),
            ))
        })?;
        if !verify_sig(pk, &inp.tx_hash, &inp.score.text, sig) {
            return Err(AdmissionError::InvalidSignature(
                "oracle signature verification failed".into(),
            )
            .into());
        }
    }
    let store = OracleStore { db: &ctx.storage.db };
    let rec = AiRiskRecord {
        tx_hash: inp.tx_hash.clone(),
        score: inp.score.value,
        score_str: inp.score.text.clone(),
        signature: inp.signature,
        oracle_pubkey: configured_pk,
    };
    store
        .put_ai_risk(&rec)
        .map_err(|e| ApiError::Admission(AdmissionError::Malformed(e.to_string())))?;
    ctx.events
        .publish(NodeEvent::AiRiskPosted { tx_hash: inp.tx_hash, score: inp.score.value });
    Ok(Json(json!({"ok": true})))
}

/// Batch ingest. Records are checked independently; a bad record is skipped
/// and reported, the rest are stored.
#[axum::debug_handler]
pub async fn post_ai_risk_batch(
    Extension(ctx): Extension<RpcContext>,
    Json(inp): Json<OracleAiRiskBatchInput>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let configured_pk = ctx.cfg.ai_oracle_pubkey.clone();
    let store = OracleStore { db: &ctx.storage.db };
    let mut stored = 0usize;
    let mut errors: Vec<String> = Vec::new();
    for (idx, rec) in inp.records.iter().enumerate() {
        if !(0.0..=1.0).contains(&rec.score.value) {
            errors.push(format!("record {idx}: score out of range"));
            continue;
        }
        if let Some(pk) = configured_pk.as_ref() {
            match rec.signature.as_ref() {
                Some(sig) if verify_sig(pk, &rec.tx_hash, &rec.score.text, sig) => {}
                Some(_) => {
                    errors.push(format!("record {idx}: invalid signature"));
                    continue;
                }
                None => {
                    errors.push(format!("record {idx}: missing required signature"));
                    continue;
                }
            }
        }
        let record = AiRiskRecord {
            tx_hash: rec.tx_hash.clone(),
            score: rec.score.value,
            score_str: rec.score.text.clone(),
            signature: rec.signature.clone(),
            oracle_pubkey: configured_pk.clone(),
        };
        match store.put_ai_risk(&record) {
            Ok(()) => {
                stored += 1;
                ctx.events.publish(NodeEvent::AiRiskPosted {
                    tx_hash: rec.tx_hash.clone(),
                    score: rec.score.value,
                });
            }
            Err(e) => errors.push(format!("record {idx}: {e}")),
        }
    }
    Ok(Json(json!({
        "stored": stored,
        "failed": errors.len(),
        "errors": errors,
    })))
}

/// Read back the risk record for one transaction hash.
#[axum::debug_handler]
pub async fn get_ai_risk(
    Extension(ctx): Extension<RpcContext>,
    axum::extract::Path(tx_hash): axum::extract::Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = OracleStore { db: &ctx.storage.db };
    match store.get_ai_risk(&tx_hash) {
        Some(rec) => Ok(Json(json!({
            "tx_hash": rec.tx_hash,
            "score": rec.score,
            "signed": rec.signature.is_some(),
        }))),
        None => Err(ApiError::NotFound),
    }
}

/// Oracle configuration snapshot.
#[axum::debug_handler]
pub async fn oracle_stats(
    Extension(ctx): Extension<RpcContext>,
) -> Json<serde_json::Value> {
    Json(json!({
        "signature_verification_enabled": ctx.cfg.ai_oracle_pubkey.is_some(),
        "supported_endpoints": [
            "/oracle/ai_risk",
            "/oracle/ai_risk_batch",
            "/oracle/ai_risk/:tx_hash",
            "/oracle/stats",
        ],
        "validation_rules": {
            "score_range": "0.0 to 1.0",
            "tx_hash_format": "hex string starting with 0x",
        },
    }))
}
