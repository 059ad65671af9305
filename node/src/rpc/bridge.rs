use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::events::NodeEvent;
use crate::rpc::errors::ApiError;
use crate::rpc::RpcContext;
use crate::storage::bridge::{verify_bridge_message, BridgeMessage, BridgeStore};
use crate::storage::tx::parse_amount;
use crate::verifier::AdmissionError;

#[derive(Deserialize)]
pub struct IngestBridgeMessage {
    pub id: String,
    pub source_chain: String,
    pub dest_chain: String,
    pub asset: String,
    pub amount: String, // decimal string, parsed strictly
    pub recipient: String,
    pub signatures: Vec<String>,
    pub signers: Vec<String>,
}

#[axum::debug_handler]
pub async fn ingest(
    Extension(ctx): Extension<RpcContext>,
    Json(body): Json<IngestBridgeMessage>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = BridgeStore { db: &ctx.storage.db };
    if store.is_halted() {
        return Err(crate::storage::bridge::BridgeError::Halted.into());
    }
    if store.has_message(&body.id) {
        return Ok(Json(json!({"status": "duplicate", "id": body.id})));
    }
    let amount = parse_amount(&body.amount)
        .map_err(|e| ApiError::Admission(AdmissionError::Malformed(e)))?;
    let msg = BridgeMessage {
        id: body.id,
        source_chain: body.source_chain,
        dest_chain: body.dest_chain,
        asset: body.asset,
        amount,
        recipient: body.recipient,
        signatures: body.signatures,
        signers: body.signers,
    };
    let validators = store.get_validators();
    verify_bridge_message(&msg, &validators)?;
    let custody = store
        .apply(&msg)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!(id = %msg.id, asset = %msg.asset, custody = %custody, "bridge message applied");
    ctx.events.publish(NodeEvent::BridgeApplied { id: msg.id.clone() });
    Ok(Json(json!({"status": "accepted", "id": msg.id})))
}

#[derive(Deserialize)]
pub struct BridgeHaltToggle {
    pub action: String,
}

#[axum::debug_handler]
pub async fn halt_toggle(
    Extension(ctx): Extension<RpcContext>,
    Json(body): Json<BridgeHaltToggle>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = BridgeStore { db: &ctx.storage.db };
    let halted = match body.action.as_str() {
        "halt" => true,
        "resume" => false,
        other => {
            return Err(AdmissionError::Malformed(format!(
                "unknown action: {other}; expected halt or resume"
            ))
            .into())
        }
    };
    store
        .set_halted(halted)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(json!({"halted": halted})))
}

#[axum::debug_handler]
pub async fn bridge_state(
    Extension(ctx): Extension<RpcContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let store = BridgeStore { db: &ctx.storage.db };
    serde_json::to_value(store.build_debug_state())
        .map(Json)
        .map_err(|e| ApiError::Internal(e.to_string()))
}
