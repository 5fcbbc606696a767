//! Semantic Version Comparison
//!
//! Parses three-part versions, decides update eligibility and classifies
//! an update as major, minor or patch.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, UpdateError};

/// Marker in the current version that makes every candidate eligible,
/// bypassing numeric comparison (escape hatch for unreleased builds).
const DEV_MARKER: &str = "dev";

/// Classification of an update relative to the installed version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Major,
    Minor,
    Patch,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

/// A parsed `major.minor.patch` version.
///
/// Every component must be an integer; ordering and equality are numeric
/// ("1.10.0" > "1.9.0", "1.01.0" == "1.1.0").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemanticVersion {
    /// Parse a version string. Fails unless splitting on `.` yields exactly
    /// three components that each parse as an integer; prefixed or suffixed
    /// forms like "v1.2.3" or "1.2.3-rc1" are rejected.
    pub fn parse(version: &str) -> Result<Self> {
        let parts: Vec<&str> = version.split('.').collect();
        if parts.len() != 3 {
            return Err(UpdateError::InvalidVersion(version.to_string()));
        }
        let component = |part: &str| {
            part.parse::<u64>()
                .map_err(|_| UpdateError::InvalidVersion(version.to_string()))
        };
        Ok(Self {
            major: component(parts[0])?,
            minor: component(parts[1])?,
            patch: component(parts[2])?,
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Whether `version` carries the development marker.
pub(crate) fn is_dev_build(version: &str) -> bool {
    version.to_lowercase().contains(DEV_MARKER)
}

/// Baseline a development build resolves against: the integer value of each
/// of its three components, counting a marker-carrying component as 0
/// ("0.5.0-dev" resolves as 0.5.0). Fails unless the version still has the
/// three-part shape.
pub(crate) fn dev_baseline(version: &str) -> Result<SemanticVersion> {
    let parts: Vec<&str> = version.split('.').collect();
    if parts.len() != 3 {
        return Err(UpdateError::InvalidVersion(version.to_string()));
    }
    Ok(SemanticVersion {
        major: parts[0].parse().unwrap_or(0),
        minor: parts[1].parse().unwrap_or(0),
        patch: parts[2].parse().unwrap_or(0),
    })
}

/// Whether `candidate` should be applied over `current`.
///
/// A current version carrying the development marker is always eligible.
/// Either side failing to parse means "not newer".
pub fn is_newer(current: &str, candidate: &str) -> bool {
    if is_dev_build(current) {
        return true;
    }
    match (SemanticVersion::parse(current), SemanticVersion::parse(candidate)) {
        (Ok(current), Ok(candidate)) => candidate > current,
        _ => false,
    }
}

/// Classify `candidate` relative to `current`.
pub fn classify(current: &SemanticVersion, candidate: &SemanticVersion) -> UpdateKind {
    if candidate.major > current.major {
        UpdateKind::Major
    } else if candidate.minor > current.minor {
        UpdateKind::Minor
    } else {
        UpdateKind::Patch
    }
}
