use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use dotenv::dotenv;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dytallix_node::config::NodeConfig;
use dytallix_node::events::EventBus;
use dytallix_node::genesis;
use dytallix_node::mempool::Mempool;
use dytallix_node::producer::{self, ProducerContext};
use dytallix_node::rpc::{self, RpcContext};
use dytallix_node::state::State;
use dytallix_node::storage::blocks::TpsWindow;
use dytallix_node::storage::bridge::ensure_bridge_validators;
use dytallix_node::storage::Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Arc::new(NodeConfig::from_env());
    if cfg.runtime_mocks {
        warn!("RUNTIME_MOCKS enabled: signature checks are relaxed; dev only");
    }

    std::fs::create_dir_all(&cfg.data_dir)?;
    let storage = Arc::new(Storage::open(PathBuf::from(format!(
        "{}/node.db",
        cfg.data_dir
    )))?);

    // Chain-id guard + one-shot genesis. A mismatch must abort before any
    // write path opens.
    let booted = match genesis::ensure_booted(&storage, &cfg) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "boot failed");
            std::process::exit(1);
        }
    };

    // Bridge validator set: first boot only, persisted thereafter.
    if let Err(e) = ensure_bridge_validators(&storage.db) {
        error!(error = %e, "invalid BRIDGE_VALIDATORS configuration");
        std::process::exit(1);
    }

    let state = Arc::new(Mutex::new(State::new(storage.clone())));
    let mempool = Arc::new(Mutex::new(Mempool::new()));
    let events = EventBus::default();
    let tps = Arc::new(Mutex::new(TpsWindow::new(60)));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let producer_handle = producer::spawn(
        booted,
        ProducerContext {
            storage: storage.clone(),
            state: state.clone(),
            mempool: mempool.clone(),
            events: events.clone(),
            tps: tps.clone(),
        },
        cfg.block_interval_ms,
        cfg.block_max_tx,
        cfg.empty_blocks,
        shutdown_rx,
    );

    let app = rpc::build_router(RpcContext {
        storage,
        state,
        mempool,
        events,
        tps,
        cfg: cfg.clone(),
    });

    let addr: SocketAddr = SocketAddr::from(([0, 0, 0, 0], cfg.rpc_port));
    info!(%addr, chain_id = %cfg.chain_id, "node listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    // Let the producer finish any in-flight tick before exiting.
    let _ = shutdown_tx.send(true);
    let _ = producer_handle.await;
    Ok(())
}
