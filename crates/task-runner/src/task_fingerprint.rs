use serde::Serialize;
use sha2::{Digest, Sha256};
use starbase_utils::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Version tag mixed into every fingerprint, so upgrading the scheduler
/// invalidates prior cache entries.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The inputs of a task's cache fingerprint. Equal fingerprints imply
/// interchangeable outputs, so everything that can influence a command's
/// result must appear here: the exact command string, the sorted
/// file-hash map, the scheduler version, and any project-configuration
/// tag. Fingerprints are project-local; upstream artifacts are never
/// mixed in.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFingerprint<'task> {
    pub arguments: &'task str,
    pub files: &'task BTreeMap<String, String>,
    pub tool_version: &'task str,
    pub config_tag: Option<&'task str>,
}

impl<'task> TaskFingerprint<'task> {
    pub fn new(
        arguments: &'task str,
        files: &'task BTreeMap<String, String>,
        config_tag: Option<&'task str>,
    ) -> TaskFingerprint<'task> {
        TaskFingerprint {
            arguments,
            files,
            tool_version: TOOL_VERSION,
            config_tag,
        }
    }

    /// The serialized form persisted as the cache manifest, so any
    /// fingerprint on disk can be explained after the fact.
    pub fn to_manifest(&self) -> miette::Result<String> {
        Ok(json::format(self, false)?)
    }

    /// Reduce the inputs to the hex fingerprint, returning the manifest
    /// they were hashed from alongside it.
    pub fn generate(&self) -> miette::Result<(String, String)> {
        let manifest = self.to_manifest()?;

        let mut hasher = Sha256::default();
        hasher.update(manifest.as_bytes());

        let hash = format!("{:x}", hasher.finalize());

        debug!(hash, "Generated task fingerprint");

        Ok((hash, manifest))
    }
}
