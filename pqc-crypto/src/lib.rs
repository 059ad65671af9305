//! Dytallix PQC signature registry.
//!
//! Unified verification (and test/tooling signing) over the supported
//! post-quantum signature schemes:
//! - Dilithium3 (default) and Dilithium5, always compiled
//! - Falcon-1024 behind the `falcon` feature
//! - SPHINCS+ SHA2-128s-simple behind the `sphincs` feature
//!
//! An algorithm whose feature is not compiled in yields
//! `PqcVerifyError::FeatureNotCompiled`, never a silent `false`.

use std::str::FromStr;

use pqcrypto_dilithium::{dilithium3, dilithium5};
#[cfg(feature = "falcon")]
use pqcrypto_falcon::falcon1024;
#[cfg(feature = "sphincs")]
use pqcrypto_sphincsplus::sphincssha2128ssimple;
use pqcrypto_traits::sign::{
    DetachedSignature as _, PublicKey as _, SecretKey as _,
};
use thiserror::Error;

/// Identifiers accepted on the wire for each algorithm.
pub const ALG_DILITHIUM3: &str = "dilithium3";
pub const ALG_DILITHIUM5: &str = "dilithium5";
pub const ALG_FALCON1024: &str = "falcon1024";
pub const ALG_SPHINCS: &str = "sphincs_sha2_128s_simple";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PqcAlgorithm {
    #[default]
    Dilithium3,
    Dilithium5,
    Falcon1024,
    SphincsPlus,
}

impl PqcAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            PqcAlgorithm::Dilithium3 => ALG_DILITHIUM3,
            PqcAlgorithm::Dilithium5 => ALG_DILITHIUM5,
            PqcAlgorithm::Falcon1024 => ALG_FALCON1024,
            PqcAlgorithm::SphincsPlus => ALG_SPHINCS,
        }
    }
}

impl FromStr for PqcAlgorithm {
    type Err = PqcVerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ALG_DILITHIUM3 => Ok(PqcAlgorithm::Dilithium3),
            ALG_DILITHIUM5 => Ok(PqcAlgorithm::Dilithium5),
            ALG_FALCON1024 => Ok(PqcAlgorithm::Falcon1024),
            ALG_SPHINCS => Ok(PqcAlgorithm::SphincsPlus),
            _ => Err(PqcVerifyError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

#[derive(Error, Debug)]
pub enum PqcVerifyError {
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid public key for {algorithm}: {details}")]
    InvalidPublicKey { algorithm: String, details: String },

    #[error("Invalid signature for {algorithm}: {details}")]
    InvalidSignature { algorithm: String, details: String },

    #[error("Signature verification failed for {algorithm}")]
    VerificationFailed { algorithm: String },

    #[error("PQC feature not compiled: {feature}")]
    FeatureNotCompiled { feature: String },
}

/// Verify a detached signature over `msg`.
pub fn verify(
    alg: PqcAlgorithm,
    pubkey: &[u8],
    msg: &[u8],
    sig: &[u8],
) -> Result<(), PqcVerifyError> {
    match alg {
        PqcAlgorithm::Dilithium3 => verify_dilithium3(pubkey, msg, sig),
        PqcAlgorithm::Dilithium5 => verify_dilithium5(pubkey, msg, sig),
        PqcAlgorithm::Falcon1024 => {
            #[cfg(feature = "falcon")]
            {
                verify_falcon1024(pubkey, msg, sig)
            }
            #[cfg(not(feature = "falcon"))]
            {
                Err(PqcVerifyError::FeatureNotCompiled {
                    feature: "falcon".to_string(),
                })
            }
        }
        PqcAlgorithm::SphincsPlus => {
            #[cfg(feature = "sphincs")]
            {
                verify_sphincs_plus(pubkey, msg, sig)
            }
            #[cfg(not(feature = "sphincs"))]
            {
                Err(PqcVerifyError::FeatureNotCompiled {
                    feature: "sphincs".to_string(),
                })
            }
        }
    }
}

/// Generate a keypair as raw `(public, secret)` bytes. Used by the CLI
/// tooling and by tests; the node itself only verifies.
pub fn keypair(alg: PqcAlgorithm) -> Result<(Vec<u8>, Vec<u8>), PqcVerifyError> {
    match alg {
        PqcAlgorithm::Dilithium3 => {
            let (pk, sk) = dilithium3::keypair();
            Ok((pk.as_bytes().to_vec(), sk.as_bytes().to_vec()))
        }
        PqcAlgorithm::Dilithium5 => {
            let (pk, sk) = dilithium5::keypair();
            Ok((pk.as_bytes().to_vec(), sk.as_bytes().to_vec()))
        }
        PqcAlgorithm::Falcon1024 => {
            #[cfg(feature = "falcon")]
            {
                let (pk, sk) = falcon1024::keypair();
                Ok((pk.as_bytes().to_vec(), sk.as_bytes().to_vec()))
            }
            #[cfg(not(feature = "falcon"))]
            {
                Err(PqcVerifyError::FeatureNotCompiled {
                    feature: "falcon".to_string(),
                })
            }
        }
        PqcAlgorithm::SphincsPlus => {
            #[cfg(feature = "sphincs")]
            {
                let (pk, sk) = sphincssha2128ssimple::keypair();
                Ok((pk.as_bytes().to_vec(), sk.as_bytes().to_vec()))
            }
            #[cfg(not(feature = "sphincs"))]
            {
                Err(PqcVerifyError::FeatureNotCompiled {
                    feature: "sphincs".to_string(),
                })
            }
        }
    }
}

/// Produce a detached signature over `msg`.
pub fn sign(alg: PqcAlgorithm, sk: &[u8], msg: &[u8]) -> Result<Vec<u8>, PqcVerifyError> {
    match alg {
        PqcAlgorithm::Dilithium3 => {
            let sk = dilithium3::SecretKey::from_bytes(sk).map_err(|_| {
                PqcVerifyError::InvalidPublicKey {
                    algorithm: ALG_DILITHIUM3.to_string(),
                    details: format!(
                        "expected {} secret key bytes, got {}",
                        dilithium3::secret_key_bytes(),
                        sk.len()
                    ),
                }
            })?;
            Ok(dilithium3::detached_sign(msg, &sk).as_bytes().to_vec())
        }
        PqcAlgorithm::Dilithium5 => {
            let sk = dilithium5::SecretKey::from_bytes(sk).map_err(|_| {
                PqcVerifyError::InvalidPublicKey {
                    algorithm: ALG_DILITHIUM5.to_string(),
                    details: format!(
                        "expected {} secret key bytes, got {}",
                        dilithium5::secret_key_bytes(),
                        sk.len()
                    ),
                }
            })?;
            Ok(dilithium5::detached_sign(msg, &sk).as_bytes().to_vec())
        }
        PqcAlgorithm::Falcon1024 => {
            #[cfg(feature = "falcon")]
            {
                let sk = falcon1024::SecretKey::from_bytes(sk).map_err(|_| {
                    PqcVerifyError::InvalidPublicKey {
                        algorithm: ALG_FALCON1024.to_string(),
                        details: format!(
                            "expected {} secret key bytes, got {}",
                            falcon1024::secret_key_bytes(),
                            sk.len()
                        ),
                    }
                })?;
                Ok(falcon1024::detached_sign(msg, &sk).as_bytes().to_vec())
            }
            #[cfg(not(feature = "falcon"))]
            {
                Err(PqcVerifyError::FeatureNotCompiled {
                    feature: "falcon".to_string(),
                })
            }
        }
        PqcAlgorithm::SphincsPlus => {
            #[cfg(feature = "sphincs")]
            {
                let sk = sphincssha2128ssimple::SecretKey::from_bytes(sk).map_err(|_| {
                    PqcVerifyError::InvalidPublicKey {
                        algorithm: ALG_SPHINCS.to_string(),
                        details: format!(
                            "expected {} secret key bytes, got {}",
                            sphincssha2128ssimple::secret_key_bytes(),
                            sk.len()
                        ),
                    }
                })?;
                Ok(sphincssha2128ssimple::detached_sign(msg, &sk)
                    .as_bytes()
                    .to_vec())
            }
            #[cfg(not(feature = "sphincs"))]
            {
                Err(PqcVerifyError::FeatureNotCompiled {
                    feature: "sphincs".to_string(),
                })
            }
        }
    }
}

fn verify_dilithium3(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> Result<(), PqcVerifyError> {
    let pk = dilithium3::PublicKey::from_bytes(pubkey).map_err(|_| {
        PqcVerifyError::InvalidPublicKey {
            algorithm: ALG_DILITHIUM3.to_string(),
            details: format!(
                "expected {} bytes, got {}",
                dilithium3::public_key_bytes(),
                pubkey.len()
            ),
        }
    })?;
    let sig = dilithium3::DetachedSignature::from_bytes(sig).map_err(|_| {
        PqcVerifyError::InvalidSignature {
            algorithm: ALG_DILITHIUM3.to_string(),
            details: format!(
                "expected {} bytes, got {}",
                dilithium3::signature_bytes(),
                sig.len()
            ),
        }
    })?;
    dilithium3::verify_detached_signature(&sig, msg, &pk).map_err(|_| {
        PqcVerifyError::VerificationFailed {
            algorithm: ALG_DILITHIUM3.to_string(),
        }
    })
}

fn verify_dilithium5(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> Result<(), PqcVerifyError> {
    let pk = dilithium5::PublicKey::from_bytes(pubkey).map_err(|_| {
        PqcVerifyError::InvalidPublicKey {
            algorithm: ALG_DILITHIUM5.to_string(),
            details: format!(
                "expected {} bytes, got {}",
                dilithium5::public_key_bytes(),
                pubkey.len()
            ),
        }
    })?;
    let sig = dilithium5::DetachedSignature::from_bytes(sig).map_err(|_| {
        PqcVerifyError::InvalidSignature {
            algorithm: ALG_DILITHIUM5.to_string(),
            details: format!(
                "expected {} bytes, got {}",
                dilithium5::signature_bytes(),
                sig.len()
            ),
        }
    })?;
    dilithium5::verify_detached_signature(&sig, msg, &pk).map_err(|_| {
        PqcVerifyError::VerificationFailed {
            algorithm: ALG_DILITHIUM5.to_string(),
        }
    })
}

#[cfg(feature = "falcon")]
fn verify_falcon1024(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> Result<(), PqcVerifyError> {
    let pk = falcon1024::PublicKey::from_bytes(pubkey).map_err(|_| {
        PqcVerifyError::InvalidPublicKey {
            algorithm: ALG_FALCON1024.to_string(),
            details: format!(
                "expected {} bytes, got {}",
                falcon1024::public_key_bytes(),
                pubkey.len()
            ),
        }
    })?;
    let sig = falcon1024::DetachedSignature::from_bytes(sig).map_err(|_| {
        PqcVerifyError::InvalidSignature {
            algorithm: ALG_FALCON1024.to_string(),
            details: format!("max {} bytes, got {}", falcon1024::signature_bytes(), sig.len()),
        }
    })?;
    falcon1024::verify_detached_signature(&sig, msg, &pk).map_err(|_| {
        PqcVerifyError::VerificationFailed {
            algorithm: ALG_FALCON1024.to_string(),
        }
    })
}

#[cfg(feature = "sphincs")]
fn verify_sphincs_plus(pubkey: &[u8], msg: &[u8], sig: &[u8]) -> Result<(), PqcVerifyError> {
    let pk = sphincssha2128ssimple::PublicKey::from_bytes(pubkey).map_err(|_| {
        PqcVerifyError::InvalidPublicKey {
            algorithm: ALG_SPHINCS.to_string(),
            details: format!(
                "expected {} bytes, got {}",
                sphincssha2128ssimple::public_key_bytes(),
                pubkey.len()
            ),
        }
    })?;
    let sig = sphincssha2128ssimple::DetachedSignature::from_bytes(sig).map_err(|_| {
        PqcVerifyError::InvalidSignature {
            algorithm: ALG_SPHINCS.to_string(),
            details: format!(
                "expected {} bytes, got {}",
                sphincssha2128ssimple::signature_bytes(),
                sig.len()
            ),
        }
    })?;
    sphincssha2128ssimple::verify_detached_signature(&sig, msg, &pk).map_err(|_| {
        PqcVerifyError::VerificationFailed {
            algorithm: ALG_SPHINCS.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_parsing() {
        assert_eq!(
            PqcAlgorithm::from_str("dilithium3").unwrap(),
            PqcAlgorithm::Dilithium3
        );
        assert_eq!(
            PqcAlgorithm::from_str("dilithium5").unwrap(),
            PqcAlgorithm::Dilithium5
        );
        assert_eq!(
            PqcAlgorithm::from_str("falcon1024").unwrap(),
            PqcAlgorithm::Falcon1024
        );
        assert_eq!(
            PqcAlgorithm::from_str("sphincs_sha2_128s_simple").unwrap(),
            PqcAlgorithm::SphincsPlus
        );
        assert!(matches!(
            PqcAlgorithm::from_str("ed25519"),
            Err(PqcVerifyError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn default_is_dilithium3() {
        assert_eq!(PqcAlgorithm::default(), PqcAlgorithm::Dilithium3);
    }

    #[test]
    fn dilithium3_roundtrip() {
        let (pk, sk) = keypair(PqcAlgorithm::Dilithium3).unwrap();
        let msg = b"dytallix canonical tx bytes";
        let sig = sign(PqcAlgorithm::Dilithium3, &sk, msg).unwrap();
        assert!(verify(PqcAlgorithm::Dilithium3, &pk, msg, &sig).is_ok());
    }

    #[test]
    fn dilithium3_rejects_tampered_message() {
        let (pk, sk) = keypair(PqcAlgorithm::Dilithium3).unwrap();
        let sig = sign(PqcAlgorithm::Dilithium3, &sk, b"original").unwrap();
        assert!(matches!(
            verify(PqcAlgorithm::Dilithium3, &pk, b"tampered", &sig),
            Err(PqcVerifyError::VerificationFailed { .. })
        ));
    }

    #[test]
    fn dilithium5_roundtrip() {
        let (pk, sk) = keypair(PqcAlgorithm::Dilithium5).unwrap();
        let msg = b"hello";
        let sig = sign(PqcAlgorithm::Dilithium5, &sk, msg).unwrap();
        assert!(verify(PqcAlgorithm::Dilithium5, &pk, msg, &sig).is_ok());
    }

    #[test]
    fn wrong_size_public_key_is_typed_error() {
        let (_, sk) = keypair(PqcAlgorithm::Dilithium3).unwrap();
        let sig = sign(PqcAlgorithm::Dilithium3, &sk, b"msg").unwrap();
        assert!(matches!(
            verify(PqcAlgorithm::Dilithium3, &[0u8; 7], b"msg", &sig),
            Err(PqcVerifyError::InvalidPublicKey { .. })
        ));
    }

    #[test]
    fn cross_algorithm_key_is_rejected() {
        // A Dilithium5 key has a different size than Dilithium3 expects.
        let (pk5, _) = keypair(PqcAlgorithm::Dilithium5).unwrap();
        let (_, sk3) = keypair(PqcAlgorithm::Dilithium3).unwrap();
        let sig = sign(PqcAlgorithm::Dilithium3, &sk3, b"msg").unwrap();
        assert!(matches!(
            verify(PqcAlgorithm::Dilithium3, &pk5, b"msg", &sig),
            Err(PqcVerifyError::InvalidPublicKey { .. })
        ));
    }

    #[cfg(not(feature = "falcon"))]
    #[test]
    fn falcon_not_compiled_is_typed_error() {
        match verify(PqcAlgorithm::Falcon1024, b"pk", b"msg", b"sig") {
            Err(PqcVerifyError::FeatureNotCompiled { feature }) => {
                assert_eq!(feature, "falcon")
            }
            other => panic!("expected FeatureNotCompiled, got {other:?}"),
        }
    }

    #[cfg(not(feature = "sphincs"))]
    #[test]
    fn sphincs_not_compiled_is_typed_error() {
        match verify(PqcAlgorithm::SphincsPlus, b"pk", b"msg", b"sig") {
            Err(PqcVerifyError::FeatureNotCompiled { feature }) => {
                assert_eq!(feature, "sphincs")
            }
            other => panic!("expected FeatureNotCompiled, got {other:?}"),
        }
    }
}
