mod helpers;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use ed25519_dalek::{Keypair, Signer};
use rand::rngs::OsRng;

use dytallix_node::rpc::bridge::{ingest, IngestBridgeMessage};
use dytallix_node::rpc::errors::ApiError;
use dytallix_node::storage::bridge::{
    canonical_payload, BridgeError, BridgeMessage, BridgeStore, BridgeValidator,
};
use helpers::*;

fn validator(id: &str) -> (BridgeValidator, Keypair) {
    let kp = Keypair::generate(&mut OsRng);
    let v = BridgeValidator { id: id.into(), pubkey: B64.encode(kp.public.as_bytes()) };
    (v, kp)
}

fn message(id: &str, amount: u128) -> BridgeMessage {
    BridgeMessage {
        id: id.into(),
        source_chain: "osmosis-1".into(),
        dest_chain: "dyt-local-1".into(),
        asset: "dyt".into(),
        amount,
        recipient: "dyt1recipient".into(),
        signatures: vec![],
        signers: vec![],
    }
}

fn sign_for(msg: &BridgeMessage, signers: &[(&BridgeValidator, &Keypair)]) -> BridgeMessage {
    let payload = canonical_payload(msg);
    let mut out = msg.clone();
    for (v, kp) in signers {
        out.signers.push(v.id.clone());
        out.signatures.push(B64.encode(kp.sign(payload.as_bytes()).to_bytes()));
    }
    out
}

fn ingest_body(msg: &BridgeMessage) -> IngestBridgeMessage {
    IngestBridgeMessage {
        id: msg.id.clone(),
        source_chain: msg.source_chain.clone(),
        dest_chain: msg.dest_chain.clone(),
        asset: msg.asset.clone(),
        amount: msg.amount.to_string(),
        recipient: msg.recipient.clone(),
        signatures: msg.signatures.clone(),
        signers: msg.signers.clone(),
    }
}

#[tokio::test]
async fn quorum_and_idempotency() {
    let node = boot_node(&genesis_for(&[]), |_| {});
    let (v1, k1) = validator("v1");
    let (v2, k2) = validator("v2");
    let (v3, _k3) = validator("v3");
    {
        let store = BridgeStore { db: &node.ctx.storage.db };
        store
            .set_validators(&[v1.clone(), v2.clone(), v3.clone()])
            .unwrap();
    }

    // 1 of 3 signatures: below the 2-of-3 threshold.
    let one_sig = sign_for(&message("0xmsg1", 250), &[(&v1, &k1)]);
    let err = ingest(Extension(node.ctx.clone()), Json(ingest_body(&one_sig)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Bridge(BridgeError::InsufficientQuorum { valid: 1, needed: 2 })
    ));
    assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Same id with 2 valid signatures: accepted, custody increases.
    let two_sigs = sign_for(&message("0xmsg1", 250), &[(&v1, &k1), (&v2, &k2)]);
    let res = ingest(Extension(node.ctx.clone()), Json(ingest_body(&two_sigs)))
        .await
        .unwrap();
    assert_eq!(res.0["status"], "accepted");
    {
        let store = BridgeStore { db: &node.ctx.storage.db };
        assert_eq!(store.get_custody("dyt"), 250);
        assert_eq!(store.list_applied(), vec!["0xmsg1".to_string()]);
    }

    // Resubmission: duplicate, custody unchanged.
    let res = ingest(Extension(node.ctx.clone()), Json(ingest_body(&two_sigs)))
        .await
        .unwrap();
    assert_eq!(res.0["status"], "duplicate");
    {
        let store = BridgeStore { db: &node.ctx.storage.db };
        assert_eq!(store.get_custody("dyt"), 250);
    }
}

#[tokio::test]
async fn invalid_and_unknown_signers_rejected() {
    let node = boot_node(&genesis_for(&[]), |_| {});
    let (v1, k1) = validator("v1");
    let (v2, _k2) = validator("v2");
    let (_stranger, stranger_key) = validator("stranger");
    {
        let store = BridgeStore { db: &node.ctx.storage.db };
        store.set_validators(&[v1.clone(), v2.clone()]).unwrap();
    }

    // v2's signature produced by the wrong key.
    let forged = sign_for(&message("0xmsg2", 10), &[(&v1, &k1), (&v2, &stranger_key)]);
    let err = ingest(Extension(node.ctx.clone()), Json(ingest_body(&forged)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Bridge(BridgeError::InvalidSignature(ref id)) if id == "v2"
    ));

    // A signer outside the registered set.
    let mut unknown = sign_for(&message("0xmsg3", 10), &[(&v1, &k1)]);
    unknown.signers.push("ghost".into());
    unknown.signatures.push("AAAA".into());
    let err = ingest(Extension(node.ctx.clone()), Json(ingest_body(&unknown)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ApiError::Bridge(BridgeError::UnknownValidator(ref id)) if id == "ghost"
    ));

    // Nothing was applied.
    let store = BridgeStore { db: &node.ctx.storage.db };
    assert_eq!(store.get_custody("dyt"), 0);
    assert!(store.list_applied().is_empty());
}

#[tokio::test]
async fn halted_node_rejects_ingest() {
    let node = boot_node(&genesis_for(&[]), |_| {});
    let (v1, k1) = validator("v1");
    {
        let store = BridgeStore { db: &node.ctx.storage.db };
        store.set_validators(&[v1.clone()]).unwrap();
        store.set_halted(true).unwrap();
    }

    let msg = sign_for(&message("0xmsg4", 5), &[(&v1, &k1)]);
    let err = ingest(Extension(node.ctx.clone()), Json(ingest_body(&msg)))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Bridge(BridgeError::Halted)));
    assert_eq!(err.into_response().status(), StatusCode::LOCKED);

    // Resume and the same message goes through.
    {
        let store = BridgeStore { db: &node.ctx.storage.db };
        store.set_halted(false).unwrap();
    }
    let res = ingest(Extension(node.ctx.clone()), Json(ingest_body(&msg)))
        .await
        .unwrap();
    assert_eq!(res.0["status"], "accepted");
}
