use serde::{Deserialize, Serialize};

use crate::crypto::sha256_hex;

/// (De)serialize u128 as a decimal string so amounts stay JSON-safe.
pub mod as_str_u128 {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        super::parse_amount(&s).map_err(serde::de::Error::custom)
    }
}

/// Strict decimal parse: ASCII digits only, overflow is an error.
pub fn parse_amount(s: &str) -> Result<u128, String> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid amount: {s:?}"));
    }
    s.parse::<u128>()
        .map_err(|_| format!("amount out of range: {s}"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub denom: String,
    #[serde(with = "as_str_u128")]
    pub amount: u128,
    #[serde(with = "as_str_u128")]
    pub fee: u128,
    pub nonce: u64,
    pub algorithm: String,
    pub public_key: String, // base64
    pub signature: String,  // base64
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memo: String,
}

impl Transaction {
    /// Canonical byte encoding of the transaction body. This is the preimage
    /// for both the transaction hash and the PQC signature, so the layout is
    /// frozen:
    ///
    ///   lp(from) lp(to) lp(denom) lp(amount-ascii) lp(fee-ascii)
    ///   nonce-be8
    ///   0x00 | 0x01 lp(memo)        (absent / present)
    ///   lp(algorithm)
    ///
    /// where `lp(x)` is a u32 big-endian byte length followed by the UTF-8
    /// bytes of `x`.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.from.len() + self.to.len() + self.denom.len() + self.memo.len() + 96,
        );
        push_field(&mut out, &self.from);
        push_field(&mut out, &self.to);
        push_field(&mut out, &self.denom);
        push_field(&mut out, &self.amount.to_string());
        push_field(&mut out, &self.fee.to_string());
        out.extend_from_slice(&self.nonce.to_be_bytes());
        if self.memo.is_empty() {
            out.push(0x00);
        } else {
            out.push(0x01);
            push_field(&mut out, &self.memo);
        }
        push_field(&mut out, &self.algorithm);
        out
    }

    /// `0x`-hex sha256 of the canonical bytes.
    pub fn compute_hash(&self) -> String {
        sha256_hex(&self.canonical_bytes())
    }
}

fn push_field(out: &mut Vec<u8>, field: &str) {
    out.extend_from_slice(&(field.len() as u32).to_be_bytes());
    out.extend_from_slice(field.as_bytes());
}
