//! Minisign-Compatible Signature Verification
//!
//! Validates a downloaded artifact against the published public key and the
//! detached `.minisig` sidecar fetched alongside it. Verification is
//! mandatory on every apply path; there is no unsigned-apply fallback.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::error::{Result, UpdateError};

/// Legacy algorithm: signature over the raw file content.
const ALG_ED: [u8; 2] = *b"Ed";
/// Prehashed algorithm: signature over Blake2b-512 of the content.
const ALG_ED_PREHASHED: [u8; 2] = *b"ED";

const TRUSTED_COMMENT_PREFIX: &str = "trusted comment: ";
const UNTRUSTED_COMMENT_PREFIX: &str = "untrusted comment: ";

/// A decoded minisign public key (algorithm, key id, Ed25519 key).
#[derive(Clone)]
pub struct MinisignPublicKey {
    key_id: [u8; 8],
    key: VerifyingKey,
}

impl MinisignPublicKey {
    /// Decode from minisign public key text: an optional untrusted-comment
    /// line followed by one base64 line of `alg || key_id || key`.
    pub fn decode(text: &str) -> Result<Self> {
        let encoded = payload_line(text)
            .ok_or_else(|| UpdateError::SignatureInvalid("empty public key".to_string()))?;
        let raw = BASE64
            .decode(encoded)
            .map_err(|e| UpdateError::SignatureInvalid(format!("public key base64: {e}")))?;
        if raw.len() != 42 {
            return Err(UpdateError::SignatureInvalid(format!(
                "public key length {} (want 42)",
                raw.len()
            )));
        }
        if raw[0..2] != ALG_ED {
            return Err(UpdateError::SignatureInvalid("unknown public key algorithm".to_string()));
        }
        let mut key_id = [0u8; 8];
        key_id.copy_from_slice(&raw[2..10]);
        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&raw[10..42]);
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| UpdateError::SignatureInvalid(format!("public key: {e}")))?;
        Ok(Self { key_id, key })
    }

    pub fn key_id(&self) -> [u8; 8] {
        self.key_id
    }
}

struct MinisignSignature {
    algorithm: [u8; 2],
    key_id: [u8; 8],
    signature: Signature,
    trusted_comment: String,
    global_signature: Signature,
}

/// Decode minisign detached signature text:
///
/// ```text
/// untrusted comment: <ignored>
/// base64(alg || key_id || signature)
/// trusted comment: <comment>
/// base64(global signature)
/// ```
fn decode_signature(text: &str) -> Result<MinisignSignature> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let first = lines
        .next()
        .ok_or_else(|| UpdateError::SignatureInvalid("empty signature".to_string()))?;
    let record = if first.starts_with(UNTRUSTED_COMMENT_PREFIX) {
        lines
            .next()
            .ok_or_else(|| UpdateError::SignatureInvalid("missing signature record".to_string()))?
    } else {
        first
    };

    let raw = BASE64
        .decode(record.trim())
        .map_err(|e| UpdateError::SignatureInvalid(format!("signature base64: {e}")))?;
    if raw.len() != 74 {
        return Err(UpdateError::SignatureInvalid(format!(
            "signature length {} (want 74)",
            raw.len()
        )));
    }
    let mut algorithm = [0u8; 2];
    algorithm.copy_from_slice(&raw[0..2]);
    let mut key_id = [0u8; 8];
    key_id.copy_from_slice(&raw[2..10]);
    let signature = Signature::from_slice(&raw[10..74])
        .map_err(|e| UpdateError::SignatureInvalid(format!("signature: {e}")))?;

    let trusted_line = lines
        .next()
        .ok_or_else(|| UpdateError::SignatureInvalid("missing trusted comment".to_string()))?;
    let trusted_comment = trusted_line
        .strip_prefix(TRUSTED_COMMENT_PREFIX)
        .ok_or_else(|| UpdateError::SignatureInvalid("malformed trusted comment".to_string()))?
        .to_string();

    let global_line = lines
        .next()
        .ok_or_else(|| UpdateError::SignatureInvalid("missing global signature".to_string()))?;
    let global_raw = BASE64
        .decode(global_line.trim())
        .map_err(|e| UpdateError::SignatureInvalid(format!("global signature base64: {e}")))?;
    let global_signature = Signature::from_slice(&global_raw)
        .map_err(|e| UpdateError::SignatureInvalid(format!("global signature: {e}")))?;

    Ok(MinisignSignature {
        algorithm,
        key_id,
        signature,
        trusted_comment,
        global_signature,
    })
}

fn payload_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with(UNTRUSTED_COMMENT_PREFIX))
}

/// Verifies artifacts against the process-wide published public key.
pub struct SignatureVerifier {
    public_key: MinisignPublicKey,
}

impl SignatureVerifier {
    pub fn new(public_key: MinisignPublicKey) -> Self {
        Self { public_key }
    }

    /// Verify `content` against detached signature text.
    ///
    /// Checks, in order: the signing key id matches the configured key, the
    /// content signature (raw or prehashed per the record's algorithm), and
    /// the global signature binding the trusted comment to the signature.
    pub fn verify(&self, content: &[u8], signature_text: &str) -> Result<()> {
        let sig = decode_signature(signature_text)?;

        if sig.key_id != self.public_key.key_id {
            return Err(UpdateError::SignatureInvalid(format!(
                "signed with key {}, expected {}",
                hex::encode(sig.key_id),
                hex::encode(self.public_key.key_id)
            )));
        }

        match sig.algorithm {
            ALG_ED => self
                .public_key
                .key
                .verify(content, &sig.signature)
                .map_err(|_| UpdateError::SignatureInvalid("content signature mismatch".to_string()))?,
            ALG_ED_PREHASHED => {
                let digest = Blake2b512::digest(content);
                self.public_key
                    .key
                    .verify(digest.as_slice(), &sig.signature)
                    .map_err(|_| {
                        UpdateError::SignatureInvalid("content signature mismatch".to_string())
                    })?;
            }
            other => {
                return Err(UpdateError::SignatureInvalid(format!(
                    "unknown signature algorithm {:?}",
                    String::from_utf8_lossy(&other)
                )))
            }
        }

        let mut global_message = sig.signature.to_bytes().to_vec();
        global_message.extend_from_slice(sig.trusted_comment.as_bytes());
        self.public_key
            .key
            .verify(&global_message, &sig.global_signature)
            .map_err(|_| UpdateError::SignatureInvalid("global signature mismatch".to_string()))
    }
}
