//! Asset Model
//!
//! Identity of a thing that can be updated, plus the version stamp that is
//! this system's sole persisted state.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::source::ContentSource;

const VERSION_STAMP_SUFFIX: &str = "_Version.json";
const DEFAULT_VERSION: &str = "0.0.0";

/// A named, versioned installable unit tracked by the update engine.
///
/// Immutable for the duration of one update cycle; `version` is refreshed
/// from the persisted stamp only between cycles, by the owner of the cycle.
pub struct Asset {
    pub name: String,
    /// Currently installed version, e.g. "1.0.0".
    pub version: String,
    /// Release channel, e.g. "beta".
    pub channel: String,
    /// Platform-discriminating attributes (architecture, OS, ...) matched
    /// against manifest entries as an exact key/value set.
    pub specs: HashMap<String, String>,
    /// Directory the installed asset lives in.
    pub target_folder: PathBuf,
    pub source: Arc<dyn ContentSource>,
    /// Whether major-version jumps are auto-applied.
    pub do_major_update: bool,
}

impl Asset {
    /// Create an asset whose current version is bootstrapped from the
    /// persisted stamp in `target_folder` (default `0.0.0` if absent).
    pub fn new(
        name: impl Into<String>,
        channel: impl Into<String>,
        target_folder: impl Into<PathBuf>,
        source: Arc<dyn ContentSource>,
    ) -> Self {
        let name = name.into();
        let target_folder = target_folder.into();
        let version = stored_version(&target_folder, &name);
        Self {
            name,
            version,
            channel: channel.into(),
            specs: HashMap::new(),
            target_folder,
            source,
            do_major_update: false,
        }
    }

    /// Re-read the installed version from the persisted stamp.
    pub fn refresh_version(&mut self) {
        self.version = stored_version(&self.target_folder, &self.name);
    }
}

#[derive(Serialize, Deserialize)]
struct VersionStamp {
    #[serde(rename = "Version")]
    version: String,
}

pub(crate) fn version_stamp_path(target_folder: &Path, asset_name: &str) -> PathBuf {
    target_folder.join(format!("{asset_name}{VERSION_STAMP_SUFFIX}"))
}

/// Read the installed version from `{AssetName}_Version.json`.
///
/// A missing or unreadable stamp is never an error for the caller; the
/// default `0.0.0` makes every published version an update.
pub fn stored_version(target_folder: &Path, asset_name: &str) -> String {
    let path = version_stamp_path(target_folder, asset_name);
    let Ok(data) = fs::read_to_string(&path) else {
        debug!(path = %path.display(), "no version stamp, assuming {DEFAULT_VERSION}");
        return DEFAULT_VERSION.to_string();
    };
    match serde_json::from_str::<VersionStamp>(&data) {
        Ok(stamp) => stamp.version,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "unreadable version stamp");
            DEFAULT_VERSION.to_string()
        }
    }
}

/// Persist the freshly applied version.
pub(crate) fn write_version_stamp(
    target_folder: &Path,
    asset_name: &str,
    version: &str,
) -> Result<()> {
    let stamp = VersionStamp {
        version: version.to_string(),
    };
    let content = serde_json::to_string(&stamp)?;
    fs::write(version_stamp_path(target_folder, asset_name), content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_stored_version_roundtrip() {
        let dir = tempdir().unwrap();
        write_version_stamp(dir.path(), "MyApp", "1.0.1").unwrap();

        assert_eq!(stored_version(dir.path(), "MyApp"), "1.0.1");
        let raw = fs::read_to_string(dir.path().join("MyApp_Version.json")).unwrap();
        assert_eq!(raw, r#"{"Version":"1.0.1"}"#);
    }

    #[test]
    fn test_stored_version_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(stored_version(dir.path(), "MyApp"), "0.0.0");

        fs::write(dir.path().join("MyApp_Version.json"), "not json").unwrap();
        assert_eq!(stored_version(dir.path(), "MyApp"), "0.0.0");
    }
}
