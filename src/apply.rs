//! Update Application
//!
//! Stages a downloaded artifact next to the live asset, verifies it, and
//! swaps it into place with a two-rename saga that keeps one backup
//! generation. The signature check always runs before the live file is
//! touched.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::asset::{self, Asset};
use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::manifest;
use crate::resolver::{self, UpdateCandidate};
use crate::signature::SignatureVerifier;

const STAGING_PREFIX: &str = "update_";
const BACKUP_SUFFIX: &str = ".old";
const ZIP_EXTENSION: &str = "zip";

/// Result of a successful apply.
#[derive(Debug)]
pub struct AppliedUpdate {
    pub version: String,
    /// Live path that now holds the new artifact (the target folder itself
    /// for archive artifacts).
    pub asset_file: PathBuf,
}

/// Applies resolved updates to external assets.
pub struct UpdateApplier {
    verifier: SignatureVerifier,
}

impl UpdateApplier {
    pub fn new(config: &UpdateConfig) -> Self {
        Self {
            verifier: config.verifier(),
        }
    }

    /// Resolve, select and apply the newest allowed update in one call.
    ///
    /// `Ok(None)` means no update was found upstream; errors mean an update
    /// was found (or looked for) but could not be applied.
    pub async fn update(&self, asset: &Asset) -> Result<Option<UpdateCandidate>> {
        let candidates = resolver::check_for_updates(asset).await?;
        if candidates.is_empty() {
            return Ok(None);
        }
        let candidate = resolver::select_allowed_update(&candidates, asset.do_major_update)?;
        self.apply_external_update(asset, candidate).await?;
        Ok(Some(candidate.clone()))
    }

    /// Fetch, verify and swap one candidate into place, then persist the new
    /// version stamp.
    pub async fn apply_external_update(
        &self,
        asset: &Asset,
        candidate: &UpdateCandidate,
    ) -> Result<AppliedUpdate> {
        let staging = staging_path(asset, &candidate.path);
        let artifact = asset.source.read(&candidate.path).await?;
        if let Some(parent) = staging.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&staging, &artifact)?;

        let signature = match asset
            .source
            .read(&manifest::signature_location(&candidate.path))
            .await
        {
            Ok(data) => String::from_utf8_lossy(&data).into_owned(),
            Err(e) => {
                // Do not leave a half-imported artifact behind.
                let _ = fs::remove_file(&staging);
                return Err(e);
            }
        };
        if let Err(e) = self.verifier.verify(&artifact, &signature) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }

        let asset_file = swap(asset, &staging, &candidate.path)?;
        asset::write_version_stamp(&asset.target_folder, &asset.name, &candidate.version)?;

        Ok(AppliedUpdate {
            version: candidate.version.clone(),
            asset_file,
        })
    }
}

/// Local staging path: `update_{basename}` inside the target folder, or the
/// target folder's parent for archives (an archive replaces the whole
/// folder, so it cannot be staged inside it).
fn staging_path(asset: &Asset, remote_path: &str) -> PathBuf {
    let basename = remote_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(remote_path);
    let staged_name = format!("{STAGING_PREFIX}{basename}");
    if is_zip(remote_path) {
        let parent = asset
            .target_folder
            .parent()
            .unwrap_or(&asset.target_folder);
        parent.join(staged_name)
    } else {
        asset.target_folder.join(staged_name)
    }
}

fn is_zip(remote_path: &str) -> bool {
    Path::new(remote_path)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ZIP_EXTENSION))
}

fn backup_path(live: &Path) -> PathBuf {
    let mut name = live.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

fn apply_failed(path: &Path, e: impl std::fmt::Display) -> UpdateError {
    UpdateError::ApplyFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Swap the staged artifact for the live asset, keeping one `.old` backup.
fn swap(asset: &Asset, staged: &Path, remote_path: &str) -> Result<PathBuf> {
    if is_zip(remote_path) {
        swap_archive(asset, staged)
    } else {
        let extension = Path::new(remote_path)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        swap_file(asset, staged, &extension)
    }
}

fn swap_file(asset: &Asset, staged: &Path, extension: &str) -> Result<PathBuf> {
    let live = asset
        .target_folder
        .join(format!("{}{extension}", asset.name));
    let backup = backup_path(&live);

    let backed_up = live.exists();
    if backed_up {
        // Only one backup generation is retained.
        if backup.exists() {
            fs::remove_file(&backup).map_err(|e| apply_failed(&backup, e))?;
        }
        fs::rename(&live, &backup).map_err(|e| apply_failed(&live, e))?;
    } else {
        debug!(path = %live.display(), "no installed asset file, skipping backup");
    }

    if let Err(e) = fs::rename(staged, &live) {
        // First rename is reversible; put the live file back before failing.
        if backed_up {
            if let Err(rollback) = fs::rename(&backup, &live) {
                warn!(path = %live.display(), error = %rollback, "backup rollback failed");
            }
        }
        return Err(apply_failed(&live, e));
    }
    Ok(live)
}

fn swap_archive(asset: &Asset, staged: &Path) -> Result<PathBuf> {
    let live = asset.target_folder.clone();
    let backup = backup_path(&live);

    let backed_up = live.exists();
    if backed_up {
        if backup.exists() {
            fs::remove_dir_all(&backup).map_err(|e| apply_failed(&backup, e))?;
        }
        fs::rename(&live, &backup).map_err(|e| apply_failed(&live, e))?;
    } else {
        debug!(path = %live.display(), "no installed asset folder, skipping backup");
    }

    if let Err(e) = extract_archive(staged, &live) {
        let _ = fs::remove_dir_all(&live);
        if backed_up {
            if let Err(rollback) = fs::rename(&backup, &live) {
                warn!(path = %live.display(), error = %rollback, "backup rollback failed");
            }
        }
        return Err(e);
    }
    let _ = fs::remove_file(staged);
    Ok(live)
}

fn extract_archive(staged: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target).map_err(|e| apply_failed(target, e))?;
    let file = File::open(staged).map_err(|e| apply_failed(staged, e))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| apply_failed(staged, e))?;
    archive.extract(target).map_err(|e| apply_failed(target, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::LocalSource;
    use std::io::Write;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn test_asset(target: &Path) -> Asset {
        Asset::new(
            "MyApp",
            "beta",
            target,
            Arc::new(LocalSource::new(target)),
        )
    }

    #[test]
    fn test_staging_path_plain_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("installed").join("MyApp");
        let asset = test_asset(&target);

        let staged = staging_path(&asset, "MyApp/beta/1/MyApp_1.0.1.exe");
        assert_eq!(staged, target.join("update_MyApp_1.0.1.exe"));
    }

    #[test]
    fn test_staging_path_archive_goes_to_parent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("installed").join("MyApp");
        let asset = test_asset(&target);

        let staged = staging_path(&asset, "MyApp/beta/1/MyApp_1.0.1.zip");
        assert_eq!(
            staged,
            dir.path().join("installed").join("update_MyApp_1.0.1.zip")
        );
    }

    #[test]
    fn test_swap_file_keeps_one_backup() {
        let dir = tempdir().unwrap();
        let asset = test_asset(dir.path());

        fs::write(dir.path().join("MyApp.exe"), b"v1").unwrap();
        fs::write(dir.path().join("update_a.exe"), b"v2").unwrap();
        let live = swap_file(&asset, &dir.path().join("update_a.exe"), ".exe").unwrap();
        assert_eq!(fs::read(&live).unwrap(), b"v2");
        assert_eq!(fs::read(dir.path().join("MyApp.exe.old")).unwrap(), b"v1");

        // A second apply overwrites the backup instead of accumulating.
        fs::write(dir.path().join("update_b.exe"), b"v3").unwrap();
        swap_file(&asset, &dir.path().join("update_b.exe"), ".exe").unwrap();
        assert_eq!(fs::read(&live).unwrap(), b"v3");
        assert_eq!(fs::read(dir.path().join("MyApp.exe.old")).unwrap(), b"v2");
    }

    #[test]
    fn test_swap_file_fresh_install_has_no_backup() {
        let dir = tempdir().unwrap();
        let asset = test_asset(dir.path());

        fs::write(dir.path().join("update_a.exe"), b"v1").unwrap();
        let live = swap_file(&asset, &dir.path().join("update_a.exe"), ".exe").unwrap();
        assert_eq!(fs::read(&live).unwrap(), b"v1");
        assert!(!dir.path().join("MyApp.exe.old").exists());
    }

    #[test]
    fn test_swap_archive_replaces_target_folder() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("MyApp");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("data.txt"), b"old contents").unwrap();
        let asset = test_asset(&target);

        let staged = dir.path().join("update_MyApp_1.0.1.zip");
        let mut writer = zip::ZipWriter::new(File::create(&staged).unwrap());
        writer
            .start_file("data.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"new contents").unwrap();
        writer.finish().unwrap();

        let live = swap_archive(&asset, &staged).unwrap();
        assert_eq!(fs::read(live.join("data.txt")).unwrap(), b"new contents");
        assert_eq!(
            fs::read(dir.path().join("MyApp.old").join("data.txt")).unwrap(),
            b"old contents"
        );
        assert!(!staged.exists());
    }
}
