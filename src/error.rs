//! Update Engine Error Types

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Content source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Not found at content source: {0}")]
    NotFound(String),

    #[error("Access denied at content source: {0}")]
    AccessDenied(String),

    #[error("Update resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("No manifest entry matches asset {asset} at version {version}")]
    NoMatchingManifestEntry { asset: String, version: String },

    #[error("No candidate satisfies the asset's update tier policy")]
    NoEligibleUpdate,

    #[error("Signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("Failed to apply update at {}: {reason}", .path.display())]
    ApplyFailed { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, UpdateError>;
