pub mod bridge;
pub mod errors;
pub mod oracle;

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{DefaultBodyLimit, Path, Query},
    http::HeaderValue,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::NodeConfig;
use crate::events::EventBus;
use crate::mempool::Mempool;
use crate::state::State;
use crate::storage::blocks::{Block, TpsWindow};
use crate::storage::oracle::OracleStore;
use crate::storage::receipts::TxReceipt;
use crate::storage::Storage;
use crate::verifier::{self, SubmitTx};
use crate::ws::server::ws_handler;

use errors::ApiError;

#[derive(Clone)]
pub struct RpcContext {
    pub storage: Arc<Storage>,
    pub state: Arc<Mutex<State>>,
    pub mempool: Arc<Mutex<Mempool>>,
    pub events: EventBus,
    pub tps: Arc<Mutex<TpsWindow>>,
    pub cfg: Arc<NodeConfig>,
}

/// Assemble the HTTP router: endpoints, CORS policy, body limits, tracing.
pub fn build_router(ctx: RpcContext) -> Router {
    let cors = match ctx.cfg.frontend_origin.as_deref() {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                warn!(%origin, "FRONTEND_ORIGIN is not a valid origin; falling back to permissive CORS");
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            }
        },
        None => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let mut app = Router::new()
        .route(
            "/submit",
            post(submit).layer(DefaultBodyLimit::max(ctx.cfg.max_tx_body)),
        )
        .route(
            "/transactions/submit", // standard endpoint path
            post(submit).layer(DefaultBodyLimit::max(ctx.cfg.max_tx_body)),
        )
        .route("/tx/:hash", get(get_tx))
        .route("/transactions/:hash", get(get_tx))
        .route("/balance/:addr", get(get_balance))
        .route("/account/:addr", get(get_account))
        .route("/block/:id", get(get_block))
        .route("/blocks", get(list_blocks))
        .route("/stats", get(stats))
        .route("/status", get(status))
        .route("/peers", get(peers))
        .route("/oracle/ai_risk", post(oracle::post_ai_risk))
        .route("/oracle/ai_risk_batch", post(oracle::post_ai_risk_batch))
        .route("/oracle/ai_risk/:tx_hash", get(oracle::get_ai_risk))
        .route("/oracle/stats", get(oracle::oracle_stats))
        .route("/bridge/ingest", post(bridge::ingest))
        .route("/bridge/halt", post(bridge::halt_toggle))
        .route("/bridge/state", get(bridge::bridge_state));

    if ctx.cfg.ws_enabled {
        app = app.route("/ws", get(ws_handler));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .layer(Extension(ctx)),
    )
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[axum::debug_handler]
pub async fn submit(
    Extension(ctx): Extension<RpcContext>,
    Json(body): Json<SubmitTx>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut st = ctx.state.lock().unwrap();
    let mut mp = ctx.mempool.lock().unwrap();
    let tx = verifier::verify_and_admit(body, &ctx.storage, &mut st, &mut mp, &ctx.cfg)?;
    // Persist the transaction and its pending receipt before releasing the
    // mempool lock: the producer must not be able to include the tx (and
    // finalize its receipt) until both records exist.
    let persisted = ctx
        .storage
        .put_tx(&tx)
        .and_then(|_| ctx.storage.put_pending_receipt(&TxReceipt::pending(&tx)));
    if let Err(e) = persisted {
        mp.drop_hashes(std::slice::from_ref(&tx.hash));
        return Err(ApiError::Internal(e.to_string()));
    }
    drop(mp);
    drop(st);
    Ok(Json(json!({"hash": tx.hash, "status": "pending"})))
}

#[axum::debug_handler]
pub async fn get_tx(
    Path(hash): Path<String>,
    Extension(ctx): Extension<RpcContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(receipt) = ctx.storage.get_receipt(&hash) else {
        if ctx.mempool.lock().unwrap().contains(&hash) {
            return Ok(Json(json!({"status": "pending", "hash": hash})));
        }
        return Err(ApiError::NotFound);
    };
    let mut body = serde_json::to_value(&receipt)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let oracle = OracleStore { db: &ctx.storage.db };
    if let Some(risk) = oracle.get_ai_risk(&hash) {
        body["ai_risk_score"] = json!(risk.score);
    }
    Ok(Json(body))
}

#[axum::debug_handler]
pub async fn get_balance(
    Path(addr): Path<String>,
    Extension(ctx): Extension<RpcContext>,
) -> Json<serde_json::Value> {
    let account = ctx.state.lock().unwrap().get_account(&addr);
    Json(json!({"balance": account.balance.to_string(), "nonce": account.nonce}))
}

#[axum::debug_handler]
pub async fn get_account(
    Path(addr): Path<String>,
    Extension(ctx): Extension<RpcContext>,
) -> Json<serde_json::Value> {
    let account = ctx.state.lock().unwrap().get_account(&addr);
    Json(json!({
        "address": addr,
        "balance": account.balance.to_string(),
        "nonce": account.nonce,
    }))
}

fn block_json(b: &Block) -> serde_json::Value {
    json!({
        "hash": b.hash,
        "height": b.header.height,
        "parent": b.header.parent,
        "timestamp": b.header.timestamp,
        "proposer": b.header.proposer,
        "tx_count": b.header.tx_count,
        "txs": b.tx_hashes,
    })
}

#[axum::debug_handler]
pub async fn get_block(
    Path(id): Path<String>,
    Extension(ctx): Extension<RpcContext>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let block = if id == "latest" {
        ctx.storage.get_block_by_height(ctx.storage.height())
    } else if id.starts_with("0x") {
        ctx.storage.get_block_by_hash(&id)
    } else {
        id.parse::<u64>()
            .ok()
            .and_then(|h| ctx.storage.get_block_by_height(h))
    };
    block.map(|b| Json(block_json(&b))).ok_or(ApiError::NotFound)
}

#[derive(Deserialize)]
pub struct BlocksQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

#[axum::debug_handler]
pub async fn list_blocks(
    Query(q): Query<BlocksQuery>,
    Extension(ctx): Extension<RpcContext>,
) -> Json<serde_json::Value> {
    let limit = q.limit.unwrap_or(10).min(100) as usize;
    let offset = q.offset.unwrap_or(0);
    let mut blocks = vec![];
    let mut h = ctx.storage.height().saturating_sub(offset);
    while h > 0 && blocks.len() < limit {
        if let Some(b) = ctx.storage.get_block_by_height(h) {
            blocks.push(block_json(&b));
        }
        h -= 1;
    }
    Json(json!({"blocks": blocks}))
}

#[axum::debug_handler]
pub async fn stats(Extension(ctx): Extension<RpcContext>) -> Json<serde_json::Value> {
    let rolling_tps = ctx.tps.lock().unwrap().rolling_tps(now_unix());
    Json(json!({
        "height": ctx.storage.height(),
        "mempool_size": ctx.mempool.lock().unwrap().len(),
        "chain_id": ctx.storage.chain_id(),
        "rolling_tps": rolling_tps,
    }))
}

#[axum::debug_handler]
pub async fn status(Extension(ctx): Extension<RpcContext>) -> Json<serde_json::Value> {
    Json(json!({
        "chain_id": ctx.storage.chain_id(),
        "height": ctx.storage.height(),
        "version": env!("CARGO_PKG_VERSION"),
        "ws_subscribers": ctx.events.subscriber_count(),
        "ws_lagged_total": ctx.events.lagged_total(),
    }))
}

/// Single-node deployment: no peers, kept for API compatibility.
#[axum::debug_handler]
pub async fn peers() -> Json<serde_json::Value> {
    Json(json!([]))
}
