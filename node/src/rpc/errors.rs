use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::storage::bridge::BridgeError;
use crate::verifier::AdmissionError;

/// Everything a handler can answer with besides a success body. The HTTP
/// status and the `{error: Kind, ...}` wire shape live here and nowhere else.
#[derive(Debug)]
pub enum ApiError {
    Admission(AdmissionError),
    Bridge(BridgeError),
    NotFound,
    Internal(String),
}

impl From<AdmissionError> for ApiError {
    fn from(e: AdmissionError) -> Self {
        ApiError::Admission(e)
    }
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        ApiError::Bridge(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Admission(e) => admission_response(e),
            ApiError::Bridge(e) => bridge_response(e),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({"error": "NotFound"}),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Internal", "message": msg}),
            ),
        };
        (status, Json(body)).into_response()
    }
}

fn admission_response(e: AdmissionError) -> (StatusCode, serde_json::Value) {
    match e {
        AdmissionError::Malformed(message) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "Malformed", "message": message}),
        ),
        AdmissionError::UnknownAlgorithm(algorithm) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "UnknownAlgorithm", "algorithm": algorithm}),
        ),
        AdmissionError::InvalidPublicKey(message) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "InvalidPublicKey", "message": message}),
        ),
        AdmissionError::InvalidSignature(message) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "InvalidSignature", "message": message}),
        ),
        AdmissionError::AddressMismatch => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "AddressMismatch"}),
        ),
        AdmissionError::InvalidNonce { expected, got } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "InvalidNonce", "expected": expected, "got": got}),
        ),
        AdmissionError::InsufficientBalance => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "InsufficientBalance"}),
        ),
        AdmissionError::Duplicate => (
            StatusCode::CONFLICT,
            json!({"error": "Duplicate"}),
        ),
        AdmissionError::MempoolFull => (
            StatusCode::TOO_MANY_REQUESTS,
            json!({"error": "MempoolFull"}),
        ),
        AdmissionError::FeatureNotCompiled(feature) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "FeatureNotCompiled", "feature": feature}),
        ),
    }
}

fn bridge_response(e: BridgeError) -> (StatusCode, serde_json::Value) {
    match e {
        BridgeError::Halted => (
            StatusCode::LOCKED,
            json!({"error": "BridgeHalted"}),
        ),
        BridgeError::LengthMismatch => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "Malformed", "message": "signers/signatures length mismatch"}),
        ),
        BridgeError::UnknownValidator(id) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "UnknownValidator", "signer": id}),
        ),
        BridgeError::InvalidSignature(id) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "InvalidSignature", "signer": id}),
        ),
        BridgeError::InsufficientQuorum { valid, needed } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"error": "InsufficientQuorum", "valid": valid, "needed": needed}),
        ),
    }
}
