use armada_project_graph::Project;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Produces, per project, the map of tracked-file path to content hash
/// that drives incremental skipping and cache fingerprints. Supplied to
/// the scheduler at construction; implementations wrap a real VCS or a
/// static fixture in tests.
///
/// Failure here is never fatal to a build: a task whose analyzer is
/// unavailable simply runs fully and is not cacheable.
#[async_trait]
pub trait ChangeAnalyzer: Send + Sync {
    /// Whether the underlying VCS integration is usable at all.
    fn is_available(&self) -> bool;

    /// Return repo-relative POSIX path -> content hash (hex) for every
    /// file under the project folder, ordered lexicographically.
    /// Identical inputs across runs must produce identical maps.
    async fn get_package_deps(
        &self,
        project: &Project,
    ) -> miette::Result<BTreeMap<String, String>>;
}
