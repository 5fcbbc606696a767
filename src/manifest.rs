//! Manifest Model & Directory Convention
//!
//! The update source is laid out per asset and channel:
//!
//! ```text
//! {AssetName}/{Channel}/latest.txt            -> latest major (bare integer)
//! {AssetName}/{Channel}/{Major}/latest.txt    -> latest version in that major
//! {AssetName}/{Channel}/{Major}/{Version}.json-> manifest entries for that version
//! ```
//!
//! Every artifact path has a detached signature co-located at
//! `{path}.minisig`. Locations are forward-slash strings, read-only to this
//! system.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::asset::Asset;

pub(crate) const LATEST_FILE_NAME: &str = "latest.txt";
pub(crate) const SIGNATURE_SUFFIX: &str = ".minisig";

/// One published artifact, as recorded in a `{Version}.json` manifest array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManifestEntry {
    pub asset: String,
    pub channel: String,
    pub version: String,
    pub specs: HashMap<String, String>,
    pub file_path: String,
}

impl ManifestEntry {
    /// Whether this entry is the artifact for `asset` at `version`.
    ///
    /// Spec maps match as sets of key/value pairs: order-independent, and a
    /// superset or subset of the asset's specs is not a match.
    pub fn matches(&self, asset: &Asset, version: &str) -> bool {
        self.asset == asset.name
            && self.channel == asset.channel
            && self.version == version
            && self.specs == asset.specs
    }

    /// Location of this entry's detached signature.
    pub fn signature_path(&self) -> String {
        signature_location(&self.file_path)
    }
}

pub(crate) fn signature_location(artifact_path: &str) -> String {
    format!("{artifact_path}{SIGNATURE_SUFFIX}")
}

/// `MyApp/beta/latest.txt` — points at the latest major.
pub(crate) fn latest_major_location(asset: &Asset) -> String {
    format!("{}/{}/{LATEST_FILE_NAME}", asset.name, asset.channel)
}

/// `MyApp/beta/3` — directory holding one major's updates.
pub(crate) fn major_location(asset: &Asset, major: &str) -> String {
    format!("{}/{}/{major}", asset.name, asset.channel)
}

/// `MyApp/beta/3/latest.txt` — points at the latest version in a major.
pub(crate) fn latest_in_major_location(asset: &Asset, major: &str) -> String {
    format!("{}/{LATEST_FILE_NAME}", major_location(asset, major))
}

/// `MyApp/beta/3/3.5.12.json` — manifest for one version's artifacts.
pub(crate) fn manifest_location(asset: &Asset, major: &str, version: &str) -> String {
    format!("{}/{version}.json", major_location(asset, major))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LocalSource;
    use std::sync::Arc;

    fn test_asset() -> Asset {
        let mut asset = Asset::new(
            "MyApp",
            "beta",
            "/tmp/does-not-matter",
            Arc::new(LocalSource::new("/tmp/does-not-matter")),
        );
        asset.version = "1.0.0".to_string();
        asset.specs = HashMap::from([
            ("Architecture".to_string(), "x64".to_string()),
            ("Platform".to_string(), "windows".to_string()),
        ]);
        asset
    }

    fn test_entry() -> ManifestEntry {
        ManifestEntry {
            asset: "MyApp".to_string(),
            channel: "beta".to_string(),
            version: "1.0.1".to_string(),
            specs: HashMap::from([
                ("Platform".to_string(), "windows".to_string()),
                ("Architecture".to_string(), "x64".to_string()),
            ]),
            file_path: "MyApp/beta/1/MyApp_1.0.1.exe".to_string(),
        }
    }

    #[test]
    fn test_match_ignores_spec_ordering() {
        // Spec maps above are declared in different insertion orders.
        assert!(test_entry().matches(&test_asset(), "1.0.1"));
    }

    #[test]
    fn test_match_rejects_identity_mismatch() {
        let asset = test_asset();

        let mut entry = test_entry();
        entry.asset = "OtherApp".to_string();
        assert!(!entry.matches(&asset, "1.0.1"));

        let mut entry = test_entry();
        entry.channel = "stable".to_string();
        assert!(!entry.matches(&asset, "1.0.1"));

        // Entry version differing from the resolved latest is not a match.
        assert!(!test_entry().matches(&asset, "1.0.2"));
    }

    #[test]
    fn test_match_rejects_spec_cardinality_mismatch() {
        let asset = test_asset();

        let mut entry = test_entry();
        entry.specs.remove("Platform");
        assert!(!entry.matches(&asset, "1.0.1"));

        let mut entry = test_entry();
        entry
            .specs
            .insert("Vendor".to_string(), "acme".to_string());
        assert!(!entry.matches(&asset, "1.0.1"));
    }

    #[test]
    fn test_match_rejects_spec_value_mismatch() {
        let mut entry = test_entry();
        entry
            .specs
            .insert("Architecture".to_string(), "arm64".to_string());
        assert!(!entry.matches(&test_asset(), "1.0.1"));
    }

    #[test]
    fn test_manifest_wire_format() {
        let json = r#"[{
            "Asset": "MyApp",
            "Channel": "beta",
            "Version": "1.0.1",
            "Specs": {"Architecture": "x64"},
            "FilePath": "MyApp/beta/1/MyApp_1.0.1.exe"
        }]"#;
        let entries: Vec<ManifestEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_path, "MyApp/beta/1/MyApp_1.0.1.exe");
        assert_eq!(entries[0].signature_path(), "MyApp/beta/1/MyApp_1.0.1.exe.minisig");
    }

    #[test]
    fn test_locations() {
        let asset = test_asset();
        assert_eq!(latest_major_location(&asset), "MyApp/beta/latest.txt");
        assert_eq!(latest_in_major_location(&asset, "1"), "MyApp/beta/1/latest.txt");
        assert_eq!(manifest_location(&asset, "1", "1.0.1"), "MyApp/beta/1/1.0.1.json");
    }
}
