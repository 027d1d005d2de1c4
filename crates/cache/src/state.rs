use serde::{Deserialize, Serialize};
use starbase_utils::{fs, json};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const STATE_DIR: &str = ".armada/state";

/// The per-project record of the last successful run: the file-hash map
/// and the exact command string. Absence means "never built". Written
/// only on success, so an interrupted rebuild leaves no stale record.
#[derive(Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProjectBuildState {
    /// Repo-relative POSIX path -> content hash, lexicographic order.
    pub files: BTreeMap<String, String>,

    /// The exact command string that produced the outputs.
    pub arguments: String,
}

impl ProjectBuildState {
    pub fn matches(&self, files: &BTreeMap<String, String>, arguments: &str) -> bool {
        self.arguments == arguments && &self.files == files
    }
}

/// `<project>/.armada/state/package-deps.<command>.json`
pub fn get_state_path(project_root: &Path, command: &str) -> PathBuf {
    project_root
        .join(STATE_DIR)
        .join(format!("package-deps.{command}.json"))
}

/// Load prior build state. A missing or unreadable file both mean
/// "never built"; corruption is not worth failing a build over.
pub fn load_state(path: &Path) -> Option<ProjectBuildState> {
    if !path.exists() {
        return None;
    }

    match json::read_file(path) {
        Ok(state) => Some(state),
        Err(error) => {
            warn!(
                state = ?path,
                "Failed to read build state, treating the project as never built: {error}",
            );

            None
        }
    }
}

/// Persist build state atomically: write to a temporary file in the same
/// directory, then rename over the destination.
pub fn save_state(path: &Path, state: &ProjectBuildState) -> miette::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_file = path.with_extension("json.tmp");

    json::write_file(&temp_file, state, false)?;

    std::fs::rename(&temp_file, path)
        .map_err(|error| miette::miette!("Failed to persist build state: {error}"))?;

    debug!(state = ?path, "Saved build state");

    Ok(())
}

pub fn delete_state(path: &Path) -> miette::Result<()> {
    fs::remove_file(path)?;

    Ok(())
}
