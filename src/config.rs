//! Engine Configuration
//!
//! Process-wide configuration constructed once at startup and injected into
//! every component that needs it: the published minisign public key and the
//! shared HTTP client. Read-only after construction, safe to share across
//! concurrent asset schedulers.

use std::time::Duration;

use reqwest::Client;

use crate::error::{Result, UpdateError};
use crate::signature::{MinisignPublicKey, SignatureVerifier};

/// Bounded timeout applied to every content source request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("airlift/", env!("CARGO_PKG_VERSION"));

pub struct UpdateConfig {
    public_key: MinisignPublicKey,
    http: Client,
}

impl UpdateConfig {
    /// Parse the published public key and build the shared HTTP transport.
    pub fn new(public_key_text: &str) -> Result<Self> {
        let public_key = MinisignPublicKey::decode(public_key_text)?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| UpdateError::SourceUnavailable(format!("http client: {e}")))?;
        Ok(Self { public_key, http })
    }

    /// The shared, reusable HTTP transport (cheap to clone; clones share the
    /// connection pool).
    pub fn http_client(&self) -> Client {
        self.http.clone()
    }

    pub fn verifier(&self) -> SignatureVerifier {
        SignatureVerifier::new(self.public_key.clone())
    }
}
