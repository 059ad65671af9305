use crate::addr;

/// Runtime configuration, read once at boot from the environment
/// (`dotenv` having been applied first).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub data_dir: String,
    pub chain_id: String,
    pub genesis_file: String,
    pub block_interval_ms: u64,
    pub empty_blocks: bool,
    pub block_max_tx: usize,
    pub ws_enabled: bool,
    pub max_tx_body: usize,
    pub frontend_origin: Option<String>,
    pub ai_oracle_pubkey: Option<String>,
    pub runtime_mocks: bool,
    pub rpc_port: u16,
    pub hrp: String,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("DYT_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            chain_id: std::env::var("DYT_CHAIN_ID").unwrap_or_else(|_| "dyt-local-1".to_string()),
            genesis_file: std::env::var("DYT_GENESIS_FILE")
                .unwrap_or_else(|_| "genesisBlock.json".to_string()),
            block_interval_ms: env_parse("DYT_BLOCK_INTERVAL_MS", 2000),
            empty_blocks: env_flag("DYT_EMPTY_BLOCKS", true),
            block_max_tx: env_parse("BLOCK_MAX_TX", 100),
            ws_enabled: env_flag("DYT_WS_ENABLED", true),
            max_tx_body: env_parse("MAX_TX_BODY", 8192),
            frontend_origin: std::env::var("FRONTEND_ORIGIN").ok(),
            ai_oracle_pubkey: std::env::var("AI_ORACLE_PUBKEY").ok(),
            runtime_mocks: env_flag("RUNTIME_MOCKS", false),
            rpc_port: env_parse("DYT_RPC_PORT", 3030),
            hrp: addr::DEFAULT_HRP.to_string(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".into(),
            chain_id: "dyt-local-1".into(),
            genesis_file: "genesisBlock.json".into(),
            block_interval_ms: 2000,
            empty_blocks: true,
            block_max_tx: 100,
            ws_enabled: true,
            max_tx_body: 8192,
            frontend_origin: None,
            ai_oracle_pubkey: None,
            runtime_mocks: false,
            rpc_port: 3030,
            hrp: addr::DEFAULT_HRP.into(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
