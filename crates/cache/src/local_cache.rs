use crate::build_cache::{BuildCache, RestoreResult, StoreResult};
use crate::cache_engine::CacheEngine;
use crate::cache_error::CacheError;
use crate::cache_mode::CacheMode;
use armada_project_graph::Project;
use async_trait::async_trait;
use starbase_archive::tar::{TarPacker, TarUnpacker};
use starbase_archive::Archiver;
use std::path::Path;
use tracing::{debug, instrument};

/// Content-addressed artifact store on the local file system: the
/// project's declared output trees, packed as
/// `.armada/cache/outputs/<fingerprint>.tar.gz`.
pub struct LocalBuildCache {
    engine: CacheEngine,
    mode: CacheMode,
}

impl LocalBuildCache {
    pub fn new(workspace_root: &Path, mode: CacheMode) -> miette::Result<LocalBuildCache> {
        Ok(LocalBuildCache {
            engine: CacheEngine::new(workspace_root)?,
            mode,
        })
    }

    pub fn engine(&self) -> &CacheEngine {
        &self.engine
    }

    fn is_cache_eligible(&self, project: &Project) -> bool {
        !project.output_dirs.is_empty()
    }
}

#[async_trait]
impl BuildCache for LocalBuildCache {
    #[instrument(skip(self, project))]
    async fn try_restore(
        &self,
        fingerprint: &str,
        project: &Project,
    ) -> miette::Result<RestoreResult> {
        if !self.mode.is_readable() || !self.is_cache_eligible(project) {
            return Ok(RestoreResult::Miss);
        }

        let archive_file = self.engine.get_archive_path(fingerprint);

        if !archive_file.exists() {
            return Ok(RestoreResult::Miss);
        }

        debug!(
            archive_file = ?archive_file,
            "Restoring outputs from local cache"
        );

        let archive = Archiver::new(&project.root, &archive_file);

        archive
            .unpack(TarUnpacker::new_gz)
            .map_err(|error| CacheError::RestoreFailed {
                fingerprint: fingerprint.to_owned(),
                error: error.to_string(),
            })?;

        Ok(RestoreResult::Restored)
    }

    #[instrument(skip(self, project))]
    async fn try_store(
        &self,
        fingerprint: &str,
        project: &Project,
    ) -> miette::Result<StoreResult> {
        if !self.is_cache_eligible(project) || !self.mode.is_writable() {
            return Ok(StoreResult::Skipped);
        }

        let archive_file = self.engine.get_archive_path(fingerprint);

        // Equal fingerprints imply interchangeable outputs
        if archive_file.exists() {
            return Ok(StoreResult::Stored);
        }

        debug!(
            archive_file = ?archive_file,
            "Archiving outputs into local cache"
        );

        // Pack into a temporary file and rename, so a concurrent restore
        // never observes a half-written archive
        let temp_file = archive_file.with_extension("gz.tmp");
        let globs = project
            .output_dirs
            .iter()
            .map(|dir| format!("{dir}/**/*"))
            .collect::<Vec<_>>();

        let mut archive = Archiver::new(&project.root, &temp_file);

        for glob in &globs {
            archive.add_source_glob(glob);
        }

        archive
            .pack(TarPacker::new_gz)
            .map_err(|error| CacheError::StoreFailed {
                fingerprint: fingerprint.to_owned(),
                error: error.to_string(),
            })?;

        std::fs::rename(&temp_file, &archive_file).map_err(|error| CacheError::StoreFailed {
            fingerprint: fingerprint.to_owned(),
            error: error.to_string(),
        })?;

        Ok(StoreResult::Stored)
    }

    async fn save_manifest(&self, fingerprint: &str, manifest: &str) -> miette::Result<()> {
        if !self.mode.is_readable() {
            return Ok(());
        }

        self.engine.write_manifest(fingerprint, manifest)
    }
}
