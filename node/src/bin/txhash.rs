// Conformance-vector tool: given a transaction body as JSON, print the
// canonical byte encoding (hex) and the resulting transaction hash.
// The same bytes are the signature preimage.
//
// Usage: txhash <tx.json> [out.bin]

use std::env;
use std::fs;

use serde::Deserialize;

use dytallix_node::storage::tx::Transaction;

#[derive(Deserialize)]
struct TxBody {
    from: String,
    to: String,
    #[serde(default = "default_denom")]
    denom: String,
    amount: String,
    fee: String,
    nonce: u64,
    #[serde(default = "default_algorithm")]
    algorithm: String,
    #[serde(default)]
    memo: String,
}

fn default_denom() -> String {
    "native".to_string()
}

fn default_algorithm() -> String {
    "dilithium3".to_string()
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: txhash <tx.json> [out.bin]");
        std::process::exit(1);
    }
    let data = fs::read_to_string(&args[1])?;
    let body: TxBody = serde_json::from_str(&data)?;
    let tx = Transaction {
        hash: String::new(),
        from: body.from,
        to: body.to,
        denom: body.denom,
        amount: body.amount.parse()?,
        fee: body.fee.parse()?,
        nonce: body.nonce,
        algorithm: body.algorithm,
        public_key: String::new(),
        signature: String::new(),
        memo: body.memo,
    };
    let bytes = tx.canonical_bytes();
    println!("canonical_bytes: {}", hex::encode(&bytes));
    println!("tx_hash: {}", tx.compute_hash());
    if let Some(out_path) = args.get(2) {
        fs::write(out_path, &bytes)?;
    }
    Ok(())
}
