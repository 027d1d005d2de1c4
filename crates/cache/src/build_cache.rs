use armada_project_graph::Project;
use async_trait::async_trait;

/// Outcome of a cache restore attempt. Errors are surfaced through the
/// `Result` and degrade to a miss at the call site.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RestoreResult {
    /// The project's output tree has been materialized.
    Restored,
    Miss,
}

/// Outcome of a cache store attempt. `Skipped` means writes are
/// disabled or the project is not cache-eligible.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreResult {
    Stored,
    Skipped,
}

/// Content-addressed artifact store keyed by a cache fingerprint: equal
/// fingerprints imply interchangeable outputs. Implementations must be
/// race-safe (concurrent restores of one fingerprint each restore or
/// miss, never corrupt) and idempotent on store.
#[async_trait]
pub trait BuildCache: Send + Sync {
    async fn try_restore(
        &self,
        fingerprint: &str,
        project: &Project,
    ) -> miette::Result<RestoreResult>;

    async fn try_store(&self, fingerprint: &str, project: &Project)
        -> miette::Result<StoreResult>;

    /// Persist the serialized inputs that produced a fingerprint, for
    /// diagnosing cache entries after the fact. Stores without a
    /// manifest concept may ignore this.
    async fn save_manifest(&self, _fingerprint: &str, _manifest: &str) -> miette::Result<()> {
        Ok(())
    }
}
