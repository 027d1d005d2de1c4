use crate::analyzer::ChangeAnalyzer;
use crate::process_cache::ProcessCache;
use crate::vcs_error::VcsError;
use armada_common::path::standardize_separators;
use armada_project_graph::Project;
use async_trait::async_trait;
use starbase_utils::glob::GlobSet;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Working-tree changes relevant to file hashing, extracted from
/// `git status --porcelain -z`.
#[derive(Debug, Default, PartialEq)]
pub struct StatusChanges {
    /// Files whose working-tree content differs from the index, plus
    /// untracked files. These need a fresh content hash.
    pub changed: Vec<String>,

    /// Files deleted from the working tree.
    pub deleted: Vec<String>,
}

pub struct Git {
    process: ProcessCache,

    /// Root of the repository that contains `.git`.
    pub repository_root: PathBuf,

    /// Root of the workspace. May be nested within the repository.
    pub workspace_root: PathBuf,
}

impl Git {
    /// Discover the repository containing the workspace. Fails with
    /// `VcsError::NotAvailable` when no `.git` exists in the workspace
    /// root or any ancestor; a missing `git` binary surfaces on first
    /// use and is treated the same way by consumers.
    pub fn load<P: AsRef<Path>>(workspace_root: P) -> miette::Result<Git> {
        let workspace_root = workspace_root.as_ref();

        debug!(
            starting_dir = ?workspace_root,
            "Attempting to find a .git directory"
        );

        let repository_root = workspace_root
            .ancestors()
            .find(|dir| dir.join(".git").exists())
            .map(Path::to_path_buf)
            .ok_or(VcsError::NotAvailable {
                dir: workspace_root.to_path_buf(),
            })?;

        debug!(
            repository_root = ?repository_root,
            "Using git as the change analyzer"
        );

        Ok(Git {
            process: ProcessCache::new("git", &repository_root),
            repository_root,
            workspace_root: workspace_root.to_path_buf(),
        })
    }

    /// Repository-relative folder of the provided project, POSIX style.
    fn relative_dir(&self, project: &Project) -> miette::Result<String> {
        let rel = project
            .root
            .strip_prefix(&self.repository_root)
            .map_err(|_| VcsError::OutsideRepository {
                dir: project.root.clone(),
            })?;

        Ok(standardize_separators(rel.to_string_lossy()))
    }

    /// Tracked files under `dir` with their index object ids, from
    /// `git ls-files -s`.
    async fn get_tracked_hashes(&self, dir: &str) -> miette::Result<BTreeMap<String, String>> {
        let output = self
            .process
            .run(
                ["ls-files", "-s", "-z", "--full-name", "--", dir],
                false,
            )
            .await?;

        Ok(parse_ls_files(&output))
    }

    /// Working-tree changes under `dir`. Never memoized: the whole point
    /// is to observe files the index has not seen yet.
    async fn get_status_changes(&self, dir: &str) -> miette::Result<StatusChanges> {
        let command = self.process.create_command([
            "status",
            "--porcelain",
            "--untracked-files",
            // Special characters in file names are emitted as-is
            // instead of being quoted/escaped
            "-z",
            "--",
            dir,
        ]);

        let output = self.process.run_command_without_cache(command, false).await?;

        Ok(parse_status(&output))
    }

    /// Streaming content hashes for the provided repo-relative files,
    /// batched through `git hash-object --stdin-paths`.
    async fn hash_files(&self, files: &[String]) -> miette::Result<Vec<String>> {
        let mut command = self.process.create_command(["hash-object", "--stdin-paths"]);
        command.input([files.join("\n")]);

        let output = self.process.run_command(command, true).await?;

        let hashes = output
            .lines()
            .filter(|hash| !hash.is_empty())
            .map(|hash| hash.to_owned())
            .collect::<Vec<_>>();

        if hashes.len() != files.len() {
            return Err(VcsError::HashCountMismatch {
                expected: files.len(),
                actual: hashes.len(),
            }
            .into());
        }

        Ok(hashes)
    }
}

#[async_trait]
impl ChangeAnalyzer for Git {
    fn is_available(&self) -> bool {
        self.repository_root.join(".git").exists()
    }

    #[instrument(name = "get_package_deps", skip_all)]
    async fn get_package_deps(
        &self,
        project: &Project,
    ) -> miette::Result<BTreeMap<String, String>> {
        let dir = self.relative_dir(project)?;

        // Start from the index, then overlay the working tree
        let mut map = self.get_tracked_hashes(&dir).await?;
        let changes = self.get_status_changes(&dir).await?;

        for path in &changes.deleted {
            map.remove(path);
        }

        let to_hash = changes
            .changed
            .iter()
            // `git hash-object` fails on files that no longer exist
            .filter(|path| self.repository_root.join(path).is_file())
            .cloned()
            .collect::<Vec<_>>();

        if !to_hash.is_empty() {
            let hashes = self.hash_files(&to_hash).await?;

            for (path, hash) in to_hash.into_iter().zip(hashes) {
                map.insert(path, hash);
            }
        }

        if !project.ignore_globs.is_empty() {
            let ignore = GlobSet::new(&project.ignore_globs)?;

            map.retain(|path, _| !ignore.is_match(path));
        }

        debug!(
            project = &project.name,
            files = map.len(),
            "Computed file content hashes"
        );

        Ok(map)
    }
}

/// Parse `git ls-files -s -z` output: `<mode> <oid> <stage>\t<path>`
/// entries separated by NUL bytes.
pub fn parse_ls_files(output: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();

    for entry in output.split('\0') {
        if let Some((meta, path)) = entry.split_once('\t') {
            let mut fields = meta.split_whitespace();
            let _mode = fields.next();

            if let Some(oid) = fields.next() {
                map.insert(path.to_owned(), oid.to_owned());
            }
        }
    }

    map
}

/// Parse `git status --porcelain -z` output. Entries are
/// `XY <path>`, with rename/copy entries followed by the original
/// path as a separate NUL-separated field.
/// See <https://git-scm.com/docs/git-status#_short_format>.
pub fn parse_status(output: &str) -> StatusChanges {
    let mut changes = StatusChanges::default();
    let mut entries = output.split('\0');

    while let Some(entry) = entries.next() {
        if entry.len() < 4 {
            continue;
        }

        let mut chars = entry.chars();
        let x = chars.next().unwrap_or_default();
        let y = chars.next().unwrap_or_default();
        let path = entry[3..].to_owned();

        // Ignored files never contribute to hashing
        if x == '!' {
            continue;
        }

        if x == 'D' || y == 'D' {
            changes.deleted.push(path);
            continue;
        }

        // The original path of a rename/copy trails as its own field
        // and no longer exists under its old name
        if x == 'R' || x == 'C' {
            if let Some(from_path) = entries.next() {
                changes.deleted.push(from_path.to_owned());
            }
        }

        if x == '?' || matches!(x, 'A' | 'C' | 'M' | 'R' | 'T') || matches!(y, 'M' | 'T') {
            changes.changed.push(path);
        }
    }

    changes
}
