//! Self-Update Bootstrap
//!
//! A running executable cannot replace its own open file, so self-update
//! stages the verified artifact under a fixed name, generates a small
//! bootstrap script and launches it detached. The script terminates the
//! process by image name, performs the rename swap, relaunches the program
//! and deletes itself; success is only observable by the next launch
//! reporting the new version.

use std::env;
use std::fs;
use std::path::Path;
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::asset::Asset;
use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::manifest;
use crate::resolver::{self, UpdateCandidate};
use crate::signature::SignatureVerifier;

/// Fixed local name the verified artifact is staged under.
const STAGED_FILE_NAME: &str = "updater";

const WINDOWS_SCRIPT_NAME: &str = "updater.bat";
const UNIX_SCRIPT_NAME: &str = "updater.sh";

const DEPRECATED_SUFFIX: &str = ".old";

/// Phase of one self-update attempt.
///
/// There is no `Applied` phase: the bootstrap script terminates the process
/// before an apply could ever be observed from inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    Idle,
    Resolving,
    Fetching,
    Verifying,
    Bootstrapping,
}

impl Default for UpdatePhase {
    fn default() -> Self {
        Self::Idle
    }
}

/// Parameters substituted into the bootstrap script. The generated script
/// contains no logic beyond these five steps.
#[derive(Debug, Clone)]
pub struct BootstrapScript {
    pub program_name: String,
    pub deprecated_name: String,
    pub staged_name: String,
    pub script_name: String,
}

impl BootstrapScript {
    fn with_script(program_name: &str, script_name: &str) -> Self {
        Self {
            program_name: program_name.to_string(),
            deprecated_name: format!("{program_name}{DEPRECATED_SUFFIX}"),
            staged_name: STAGED_FILE_NAME.to_string(),
            script_name: script_name.to_string(),
        }
    }

    pub fn windows(program_name: &str) -> Self {
        Self::with_script(program_name, WINDOWS_SCRIPT_NAME)
    }

    pub fn unix(program_name: &str) -> Self {
        Self::with_script(program_name, UNIX_SCRIPT_NAME)
    }

    fn for_program(program_name: &str) -> Self {
        #[cfg(windows)]
        {
            Self::windows(program_name)
        }
        #[cfg(not(windows))]
        {
            Self::unix(program_name)
        }
    }

    /// Terminate by image name, swap the executable, relaunch, self-delete.
    pub fn render_windows(&self) -> String {
        format!(
            "Taskkill /IM {program} /F\r\n\
             rename {program} {deprecated}\r\n\
             rename {staged} {program}\r\n\
             start {program}\r\n\
             del {script}\r\n",
            program = self.program_name,
            deprecated = self.deprecated_name,
            staged = self.staged_name,
            script = self.script_name,
        )
    }

    pub fn render_unix(&self) -> String {
        format!(
            "#!/bin/sh\n\
             pkill -9 -x '{program}'\n\
             mv '{program}' '{deprecated}'\n\
             mv '{staged}' '{program}'\n\
             './{program}' &\n\
             rm -- '{script}'\n",
            program = self.program_name,
            deprecated = self.deprecated_name,
            staged = self.staged_name,
            script = self.script_name,
        )
    }

    pub fn render(&self) -> String {
        #[cfg(windows)]
        {
            self.render_windows()
        }
        #[cfg(not(windows))]
        {
            self.render_unix()
        }
    }
}

/// Replaces the currently running executable.
pub struct SelfUpdater {
    verifier: SignatureVerifier,
    phase: UpdatePhase,
}

impl SelfUpdater {
    pub fn new(config: &UpdateConfig) -> Self {
        Self {
            verifier: config.verifier(),
            phase: UpdatePhase::Idle,
        }
    }

    pub fn phase(&self) -> UpdatePhase {
        self.phase
    }

    /// Resolve, fetch, verify and bootstrap the newest allowed update for
    /// the running executable.
    ///
    /// `Ok(None)` means no update was found. On `Ok(Some(_))` the bootstrap
    /// script has been launched and will terminate this process shortly;
    /// continued execution past this point is best-effort only.
    pub async fn self_update(&mut self, asset: &Asset) -> Result<Option<UpdateCandidate>> {
        self.phase = UpdatePhase::Resolving;
        let candidates = match resolver::check_for_updates(asset).await {
            Ok(candidates) => candidates,
            Err(e) => return Err(self.fail(e)),
        };
        if candidates.is_empty() {
            self.phase = UpdatePhase::Idle;
            return Ok(None);
        }
        let candidate = match resolver::select_allowed_update(&candidates, asset.do_major_update) {
            Ok(candidate) => candidate.clone(),
            Err(e) => return Err(self.fail(e)),
        };

        self.phase = UpdatePhase::Fetching;
        let artifact = match asset.source.read(&candidate.path).await {
            Ok(artifact) => artifact,
            Err(e) => return Err(self.fail(e)),
        };
        if let Err(e) = fs::write(STAGED_FILE_NAME, &artifact) {
            return Err(self.fail(e.into()));
        }

        self.phase = UpdatePhase::Verifying;
        let signature = match asset
            .source
            .read(&manifest::signature_location(&candidate.path))
            .await
        {
            Ok(data) => String::from_utf8_lossy(&data).into_owned(),
            Err(e) => {
                let _ = fs::remove_file(STAGED_FILE_NAME);
                return Err(self.fail(e));
            }
        };
        if let Err(e) = self.verifier.verify(&artifact, &signature) {
            let _ = fs::remove_file(STAGED_FILE_NAME);
            return Err(self.fail(e));
        }

        self.phase = UpdatePhase::Bootstrapping;
        let script = BootstrapScript::for_program(&running_program_name(asset)?);
        if let Err(e) = fs::write(&script.script_name, script.render()) {
            return Err(self.fail(e.into()));
        }
        if let Err(e) = launch_detached(&script.script_name) {
            return Err(self.fail(e));
        }

        info!(
            asset = %asset.name,
            version = %candidate.version,
            "bootstrap launched, awaiting external termination"
        );
        Ok(Some(candidate))
    }

    fn fail(&mut self, e: UpdateError) -> UpdateError {
        self.phase = UpdatePhase::Idle;
        e
    }
}

/// Image name of the running process, as the bootstrap script addresses it.
fn running_program_name(asset: &Asset) -> Result<String> {
    let exe = env::current_exe().map_err(|e| UpdateError::ApplyFailed {
        path: asset.target_folder.clone(),
        reason: format!("cannot resolve running executable: {e}"),
    })?;
    Ok(exe
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| asset.name.clone()))
}

fn launch_detached(script: &str) -> Result<()> {
    let result = {
        #[cfg(windows)]
        {
            Command::new("cmd").args(["/c", script]).spawn()
        }
        #[cfg(not(windows))]
        {
            Command::new("sh").arg(script).spawn()
        }
    };
    result
        .map(|_child| ())
        .map_err(|e| UpdateError::ApplyFailed {
            path: Path::new(script).to_path_buf(),
            reason: format!("failed to launch bootstrap script: {e}"),
        })
}
