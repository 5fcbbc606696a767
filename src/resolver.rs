//! Update Resolution
//!
//! Walks the directory convention to find the latest major and latest
//! patch/minor candidates for an asset, and picks the candidate the asset's
//! tier policy allows.
//!
//! Updates are looked for per major: one pass over the current version's
//! major directory always runs, and a second pass over the latest major runs
//! when it differs. The latest-major pass is optional — its failures are
//! logged and recovered so a broken major directory can never block
//! patch-level resolution.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::asset::Asset;
use crate::error::{Result, UpdateError};
use crate::manifest::{self, ManifestEntry};
use crate::version::{self, classify, is_newer, SemanticVersion, UpdateKind};

/// A resolved, not-yet-applied update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCandidate {
    /// Version the candidate updates to.
    pub version: String,
    /// Artifact location at the content source.
    pub path: String,
    pub kind: UpdateKind,
}

/// Look for the latest updates available at the asset's content source.
///
/// Returns 0, 1 or 2 candidates; when two are present the latest-major
/// candidate comes first. An empty result means "no updates found" and is
/// not an error. Fails with [`UpdateError::InvalidVersion`] on a malformed
/// installed version and [`UpdateError::ResolutionFailed`] when the channel
/// root `latest.txt` cannot be read.
pub async fn check_for_updates(asset: &Asset) -> Result<Vec<UpdateCandidate>> {
    let current = installed_version(asset)?;

    let latest_major = read_text(asset, &manifest::latest_major_location(asset))
        .await
        .map_err(|e| UpdateError::ResolutionFailed(format!("channel root latest.txt: {e}")))?;

    let mut candidates = Vec::new();

    if latest_major != current.major.to_string() {
        match resolve_in_major(asset, &current, &latest_major).await {
            Ok(Some(candidate)) => candidates.push(candidate),
            Ok(None) => {}
            Err(e) => warn!(
                asset = %asset.name,
                major = %latest_major,
                error = %e,
                "skipping latest-major branch"
            ),
        }
    }

    match resolve_in_major(asset, &current, &current.major.to_string()).await {
        Ok(Some(candidate)) => candidates.push(candidate),
        Ok(None) => {}
        Err(e) => warn!(
            asset = %asset.name,
            major = %current.major,
            error = %e,
            "skipping current-major branch"
        ),
    }

    for candidate in &candidates {
        info!(
            asset = %asset.name,
            from = %asset.version,
            to = %candidate.version,
            kind = %candidate.kind,
            path = %candidate.path,
            "update available"
        );
    }
    Ok(candidates)
}

/// Parse the installed version, substituting the integer baseline for
/// development builds (whose marker suffix fails strict parsing).
fn installed_version(asset: &Asset) -> Result<SemanticVersion> {
    match SemanticVersion::parse(&asset.version) {
        Ok(current) => Ok(current),
        Err(_) if version::is_dev_build(&asset.version) => {
            version::dev_baseline(&asset.version)
        }
        Err(e) => Err(e),
    }
}

/// Resolve the newest update inside one major's directory.
async fn resolve_in_major(
    asset: &Asset,
    current: &SemanticVersion,
    major: &str,
) -> Result<Option<UpdateCandidate>> {
    let latest = read_text(asset, &manifest::latest_in_major_location(asset, major)).await?;
    if !is_newer(&asset.version, &latest) {
        return Ok(None);
    }

    let data = asset
        .source
        .read(&manifest::manifest_location(asset, major, &latest))
        .await?;
    let entries: Vec<ManifestEntry> = serde_json::from_slice(&data)?;

    let entry = entries
        .iter()
        .find(|entry| entry.matches(asset, &latest))
        .ok_or_else(|| UpdateError::NoMatchingManifestEntry {
            asset: asset.name.clone(),
            version: latest.clone(),
        })?;

    let candidate = SemanticVersion::parse(&latest)?;
    Ok(Some(UpdateCandidate {
        kind: classify(current, &candidate),
        version: latest,
        path: entry.file_path.clone(),
    }))
}

/// Read a bare-text convention file (`latest.txt`), trimming whitespace.
async fn read_text(asset: &Asset, location: &str) -> Result<String> {
    let data = asset.source.read(location).await?;
    Ok(String::from_utf8_lossy(&data).trim().to_string())
}

/// Pick the candidate the asset's tier policy allows: the first major one
/// when major updates are enabled, otherwise the first minor, otherwise the
/// first patch.
pub fn select_allowed_update(
    candidates: &[UpdateCandidate],
    do_major_update: bool,
) -> Result<&UpdateCandidate> {
    if do_major_update {
        if let Some(candidate) = candidates.iter().find(|c| c.kind == UpdateKind::Major) {
            return Ok(candidate);
        }
    }
    for kind in [UpdateKind::Minor, UpdateKind::Patch] {
        if let Some(candidate) = candidates.iter().find(|c| c.kind == kind) {
            return Ok(candidate);
        }
    }
    Err(UpdateError::NoEligibleUpdate)
}
