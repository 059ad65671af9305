#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use tempfile::TempDir;

use dytallix_node::addr;
use dytallix_node::config::NodeConfig;
use dytallix_node::events::EventBus;
use dytallix_node::genesis;
use dytallix_node::mempool::Mempool;
use dytallix_node::producer::ProducerContext;
use dytallix_node::rpc::RpcContext;
use dytallix_node::state::State;
use dytallix_node::storage::blocks::TpsWindow;
use dytallix_node::storage::tx::Transaction;
use dytallix_node::storage::Storage;
use dytallix_node::verifier::SubmitTx;
use dytallix_pqc::PqcAlgorithm;

pub struct TestNode {
    pub dir: TempDir,
    pub ctx: RpcContext,
    pub pctx: ProducerContext,
}

/// Boot a node against a temp directory: write the genesis file, open the
/// store, run the guard, wire up the shared handles.
pub fn boot_node(genesis_json: &str, mutate: impl FnOnce(&mut NodeConfig)) -> TestNode {
    let dir = TempDir::new().unwrap();
    let genesis_path = dir.path().join("genesisBlock.json");
    std::fs::write(&genesis_path, genesis_json).unwrap();

    let mut cfg = NodeConfig {
        genesis_file: genesis_path.to_string_lossy().to_string(),
        ..NodeConfig::default()
    };
    mutate(&mut cfg);
    let cfg = Arc::new(cfg);

    let storage = Arc::new(Storage::open(dir.path().join("node.db")).unwrap());
    genesis::ensure_booted(&storage, &cfg).unwrap();

    let state = Arc::new(Mutex::new(State::new(storage.clone())));
    let mempool = Arc::new(Mutex::new(Mempool::with_capacity(1000)));
    let events = EventBus::new(64);
    let tps = Arc::new(Mutex::new(TpsWindow::new(60)));

    let pctx = ProducerContext {
        storage: storage.clone(),
        state: state.clone(),
        mempool: mempool.clone(),
        events: events.clone(),
        tps: tps.clone(),
    };
    let ctx = RpcContext { storage, state, mempool, events, tps, cfg };
    TestNode { dir, ctx, pctx }
}

pub struct Wallet {
    pub pk: Vec<u8>,
    pub sk: Vec<u8>,
    pub address: String,
}

pub fn wallet() -> Wallet {
    let (pk, sk) = dytallix_pqc::keypair(PqcAlgorithm::Dilithium3).unwrap();
    let address = addr::derive(&pk, addr::DEFAULT_HRP).unwrap();
    Wallet { pk, sk, address }
}

/// Build a fully signed `/submit` body for a transfer from `w`.
pub fn signed_submit(
    w: &Wallet,
    to: &str,
    amount: &str,
    fee: &str,
    nonce: u64,
    memo: &str,
) -> SubmitTx {
    let tx = Transaction {
        hash: String::new(),
        from: w.address.clone(),
        to: to.to_string(),
        denom: "DGT".into(),
        amount: amount.parse().unwrap(),
        fee: fee.parse().unwrap(),
        nonce,
        algorithm: "dilithium3".into(),
        public_key: B64.encode(&w.pk),
        signature: String::new(),
        memo: memo.to_string(),
    };
    let sig = dytallix_pqc::sign(PqcAlgorithm::Dilithium3, &w.sk, &tx.canonical_bytes()).unwrap();
    SubmitTx {
        from: w.address.clone(),
        to: to.to_string(),
        denom: "DGT".into(),
        amount: amount.to_string(),
        fee: fee.to_string(),
        nonce: Some(nonce),
        algorithm: "dilithium3".into(),
        public_key: B64.encode(&w.pk),
        signature: B64.encode(sig),
        memo: memo.to_string(),
    }
}

pub fn genesis_for(accounts: &[(&str, &str)]) -> String {
    let allocations: Vec<String> = accounts
        .iter()
        .map(|(addr, amount)| format!(r#"{{"address":"{addr}","amount":"{amount}"}}"#))
        .collect();
    format!(
        r#"{{"chain_id":"dyt-local-1","dgt_allocations":[{}]}}"#,
        allocations.join(",")
    )
}
