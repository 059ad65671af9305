// Hashing and ed25519 helpers shared by the verifier, producer and the
// oracle/bridge ingest paths. PQC verification lives in the dytallix-pqc
// crate.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use ed25519_dalek::{PublicKey, Signature, Verifier};
use sha2::{Digest, Sha256};

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// `0x`-prefixed lowercase hex of a sha256 digest.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(sha256(bytes)))
}

/// Verify an ed25519 signature where key and signature arrive base64-encoded
/// (the oracle and bridge wire format). Any decoding failure is a failed
/// verification.
pub fn verify_ed25519_b64(pubkey_b64: &str, msg: &[u8], sig_b64: &str) -> bool {
    if let (Ok(pk_bytes), Ok(sig_bytes)) = (B64.decode(pubkey_b64), B64.decode(sig_b64)) {
        if let (Ok(pk), Ok(sig)) = (
            PublicKey::from_bytes(&pk_bytes),
            Signature::from_bytes(&sig_bytes),
        ) {
            return pk.verify(msg, &sig).is_ok();
        }
    }
    false
}
