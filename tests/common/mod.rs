//! Shared helpers: a deterministic minisign signing identity for exercising
//! the verification path end to end.

use std::sync::Once;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};

static TRACING: Once = Once::new();

/// Route engine logs through the captured test writer; `RUST_LOG` controls
/// what the recovered-branch warnings show.
pub fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

pub const KEY_ID: [u8; 8] = [0xAA, 1, 2, 3, 4, 5, 6, 7];

pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

/// Minisign public key text for [`signing_key`].
pub fn public_key_text() -> String {
    let mut raw = b"Ed".to_vec();
    raw.extend_from_slice(&KEY_ID);
    raw.extend_from_slice(signing_key().verifying_key().as_bytes());
    format!(
        "untrusted comment: minisign public key\n{}\n",
        BASE64.encode(raw)
    )
}

/// Detached minisign signature text over `content`.
pub fn sign_artifact(content: &[u8]) -> String {
    let key = signing_key();
    let signature = key.sign(content);

    let mut record = b"Ed".to_vec();
    record.extend_from_slice(&KEY_ID);
    record.extend_from_slice(&signature.to_bytes());

    let trusted_comment = "timestamp:1700000000\tfile:artifact";
    let mut global_message = signature.to_bytes().to_vec();
    global_message.extend_from_slice(trusted_comment.as_bytes());
    let global_signature = key.sign(&global_message);

    format!(
        "untrusted comment: signature from test key\n{}\ntrusted comment: {}\n{}\n",
        BASE64.encode(record),
        trusted_comment,
        BASE64.encode(global_signature.to_bytes())
    )
}
