// Dev signing tool for local end-to-end runs: generate a PQC keypair with
// its on-chain address, and sign transaction bodies (or raw messages) the
// way the node verifies them.
//
// Usage:
//   pqc_signer keygen [algorithm]
//   pqc_signer sign-tx <sk_b64> <tx.json> [algorithm]
//   pqc_signer sign-raw <sk_b64> <msg> [algorithm]

use std::env;
use std::fs;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use serde::Deserialize;

use dytallix_node::addr;
use dytallix_node::storage::tx::Transaction;
use dytallix_pqc::PqcAlgorithm;

#[derive(Deserialize)]
struct TxBody {
    from: String,
    to: String,
    #[serde(default = "default_denom")]
    denom: String,
    amount: String,
    fee: String,
    nonce: u64,
    #[serde(default)]
    memo: String,
}

fn default_denom() -> String {
    "native".to_string()
}

fn algorithm_arg(args: &[String], idx: usize) -> anyhow::Result<PqcAlgorithm> {
    match args.get(idx) {
        Some(name) => Ok(PqcAlgorithm::from_str(name)?),
        None => Ok(PqcAlgorithm::default()),
    }
}

fn usage() -> ! {
    eprintln!("Usage: pqc_signer <command> [args...]");
    eprintln!("Commands:");
    eprintln!("  keygen [algorithm]                 -> prints sk_b64 pk_b64 address");
    eprintln!("  sign-tx <sk_b64> <tx.json> [alg]   -> prints sig_b64 over canonical tx bytes");
    eprintln!("  sign-raw <sk_b64> <msg> [alg]      -> prints sig_b64 over the raw message");
    std::process::exit(1);
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let Some(command) = args.get(1) else { usage() };

    match command.as_str() {
        "keygen" => {
            let alg = algorithm_arg(&args, 2)?;
            let (pk, sk) = dytallix_pqc::keypair(alg)?;
            let address = addr::derive(&pk, addr::DEFAULT_HRP)?;
            println!("{} {} {}", B64.encode(&sk), B64.encode(&pk), address);
        }
        "sign-tx" => {
            if args.len() < 4 {
                usage();
            }
            let alg = algorithm_arg(&args, 4)?;
            let sk = B64.decode(&args[2])?;
            let body: TxBody = serde_json::from_str(&fs::read_to_string(&args[3])?)?;
            let tx = Transaction {
                hash: String::new(),
                from: body.from,
                to: body.to,
                denom: body.denom,
                amount: body.amount.parse()?,
                fee: body.fee.parse()?,
                nonce: body.nonce,
                algorithm: alg.as_str().to_string(),
                public_key: String::new(),
                signature: String::new(),
                memo: body.memo,
            };
            let sig = dytallix_pqc::sign(alg, &sk, &tx.canonical_bytes())?;
            println!("{}", B64.encode(sig));
        }
        "sign-raw" => {
            if args.len() < 4 {
                usage();
            }
            let alg = algorithm_arg(&args, 4)?;
            let sk = B64.decode(&args[2])?;
            let sig = dytallix_pqc::sign(alg, &sk, args[3].as_bytes())?;
            println!("{}", B64.encode(sig));
        }
        other => {
            eprintln!("Unknown command: {other}");
            usage();
        }
    }
    Ok(())
}
