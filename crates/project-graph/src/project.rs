use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A single buildable unit within the monorepo. Identity is the unique
/// package name; everything else is configuration resolved by the caller
/// before the graph is built. Immutable for the lifetime of the process.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    /// Unique package name.
    pub name: String,

    /// Absolute path to the project folder.
    pub root: PathBuf,

    /// Workspace-relative path to the project folder, POSIX separators.
    pub source: String,

    /// Script name -> shell command string.
    pub scripts: BTreeMap<String, String>,

    /// Names of local projects this project depends on.
    pub dependencies: Vec<String>,

    /// Dependencies declared as cyclic-OK. They stay in the project
    /// graph as ordinary edges but are omitted when tasks are linked,
    /// so a declared cycle never reaches the cycle check.
    pub decoupled_dependencies: FxHashSet<String>,

    /// Project-relative folders captured by the build cache.
    pub output_dirs: Vec<String>,

    /// Folder prepended to `PATH` when running this project's commands.
    pub bin_dir: Option<PathBuf>,

    /// Workspace-relative globs excluded from the file-hash map.
    pub ignore_globs: Vec<String>,
}

impl Project {
    pub fn new<N, R>(name: N, root: R, source: &str) -> Project
    where
        N: AsRef<str>,
        R: Into<PathBuf>,
    {
        Project {
            name: name.as_ref().to_owned(),
            root: root.into(),
            source: source.to_owned(),
            ..Project::default()
        }
    }

    /// Return the shell command for the provided script name,
    /// or `None` when the project does not declare it.
    pub fn get_script(&self, name: &str) -> Option<&str> {
        self.scripts.get(name).map(|command| command.as_str())
    }

    pub fn is_dependency_decoupled(&self, name: &str) -> bool {
        self.decoupled_dependencies.contains(name)
    }
}
