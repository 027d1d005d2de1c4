use starbase_utils::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CACHE_DIR: &str = ".armada/cache";

/// Owns the workspace-level cache directory layout: hash manifests under
/// `hashes/`, output archives under `outputs/`.
pub struct CacheEngine {
    /// The `.armada/cache` directory relative to the workspace root.
    pub cache_dir: PathBuf,

    /// Stores fingerprint manifests, the serialized inputs of a hash.
    pub hashes_dir: PathBuf,

    /// Stores task outputs as fingerprint-addressed archives.
    pub outputs_dir: PathBuf,
}

impl CacheEngine {
    pub fn new(workspace_root: &Path) -> miette::Result<CacheEngine> {
        let dir = workspace_root.join(CACHE_DIR);
        let cache_tag = dir.join("CACHEDIR.TAG");

        debug!(cache_dir = ?dir, "Creating cache engine");

        let hashes_dir = dir.join("hashes");
        let outputs_dir = dir.join("outputs");

        fs::create_dir_all(&hashes_dir)?;
        fs::create_dir_all(&outputs_dir)?;

        // Mark the directory as generated content for backup tools
        if !cache_tag.exists() {
            fs::write_file(
                cache_tag,
                r#"Signature: 8a477f597d28d172789f06886806bc55
# This file is a cache directory tag created by armada.
# For information see https://bford.info/cachedir"#,
            )?;
        }

        Ok(CacheEngine {
            cache_dir: dir,
            hashes_dir,
            outputs_dir,
        })
    }

    pub fn get_archive_path(&self, fingerprint: &str) -> PathBuf {
        self.outputs_dir.join(format!("{fingerprint}.tar.gz"))
    }

    pub fn get_manifest_path(&self, fingerprint: &str) -> PathBuf {
        self.hashes_dir.join(format!("{fingerprint}.json"))
    }

    /// Persist the serialized inputs that produced a fingerprint, so any
    /// cache entry can be explained after the fact.
    pub fn write_manifest(&self, fingerprint: &str, contents: &str) -> miette::Result<()> {
        let path = self.get_manifest_path(fingerprint);

        debug!(manifest = ?path, "Saving fingerprint manifest");

        fs::write_file(&path, contents)?;

        Ok(())
    }
}
