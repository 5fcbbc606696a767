//! Airlift - signed, channel-based update resolution and delivery engine.
//!
//! Given an installed asset's current version and a remote content source
//! (HTTP endpoint, local filesystem, or blob store), Airlift determines
//! whether a newer authorized build exists, downloads it, cryptographically
//! verifies it, and swaps it into place - including self-replacing the
//! currently running executable via an external bootstrap script.
//!
//! Components:
//! - `version` - semantic version parsing, comparison and classification
//! - `source` - polymorphic read-only content sources (local, HTTP, blob)
//! - `resolver` - directory-convention update discovery and tier selection
//! - `signature` - minisign-compatible detached signature verification
//! - `apply` - staging, verification and atomic swap of external assets
//! - `self_update` - bootstrap-script based replacement of the running binary
//! - `scheduler` - periodic unattended update cycles with policy hooks

pub mod apply;
pub mod asset;
pub mod config;
pub mod error;
pub mod manifest;
pub mod resolver;
pub mod scheduler;
pub mod self_update;
pub mod signature;
pub mod source;
pub mod version;

pub use apply::{AppliedUpdate, UpdateApplier};
pub use asset::{stored_version, Asset};
pub use config::UpdateConfig;
pub use error::{Result, UpdateError};
pub use manifest::ManifestEntry;
pub use resolver::{check_for_updates, select_allowed_update, UpdateCandidate};
pub use scheduler::{AlwaysUpdate, BackgroundScheduler, SchedulerHandle, UpdatePolicy};
pub use self_update::{BootstrapScript, SelfUpdater, UpdatePhase};
pub use signature::{MinisignPublicKey, SignatureVerifier};
pub use source::{BlobSource, ContentSource, HttpSource, LocalSource};
pub use version::{SemanticVersion, UpdateKind};
