// Address derivation: sha256(pubkey)[..20] encoded as bech32 with the
// configured human-readable part. Mirrors the wallet SDK so that keys
// generated there resolve to the same on-chain address.

use bech32::{FromBase32, ToBase32, Variant};
use sha2::{Digest, Sha256};

pub const DEFAULT_HRP: &str = "dyt";

/// Derive the bech32 address for a raw public key.
pub fn derive(pubkey: &[u8], hrp: &str) -> Result<String, bech32::Error> {
    let mut hasher = Sha256::new();
    hasher.update(pubkey);
    let digest = hasher.finalize();
    let payload = &digest[..20];
    bech32::encode(hrp, payload.to_base32(), Variant::Bech32)
}

/// Check that `address` is a well-formed bech32 address under `hrp`
/// carrying a 20-byte payload.
pub fn validate(address: &str, hrp: &str) -> bool {
    match bech32::decode(address) {
        Ok((decoded_hrp, data, Variant::Bech32)) => {
            decoded_hrp == hrp
                && Vec::<u8>::from_base32(&data)
                    .map(|bytes| bytes.len() == 20)
                    .unwrap_or(false)
        }
        _ => false,
    }
}
