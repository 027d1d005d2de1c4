use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How the build cache participates in a run. Passed into the cache at
/// construction; the scheduler itself never consults the environment.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheMode {
    /// Neither restore nor store.
    Off,

    /// Restore on hit, never store.
    ReadOnly,

    /// Restore and store.
    #[default]
    ReadWrite,
}

impl CacheMode {
    pub fn is_readable(&self) -> bool {
        !matches!(self, CacheMode::Off)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, CacheMode::ReadWrite)
    }
}

impl FromStr for CacheMode {
    type Err = miette::Report;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "off" => Ok(CacheMode::Off),
            "read" | "read-only" => Ok(CacheMode::ReadOnly),
            "write" | "read-write" => Ok(CacheMode::ReadWrite),
            other => Err(miette::miette!("Unknown cache mode \"{other}\".")),
        }
    }
}
