use armada_common::{Style, Stylize};
use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum VcsError {
    #[diagnostic(code(vcs::not_available))]
    #[error(
        "No usable version control system was found starting from {}.",
        .dir.to_string_lossy().to_string().style(Style::Path),
    )]
    NotAvailable { dir: PathBuf },

    #[diagnostic(code(vcs::hash_mismatch))]
    #[error("Received {actual} content hashes for {expected} files from the VCS.")]
    HashCountMismatch { expected: usize, actual: usize },

    #[diagnostic(code(vcs::outside_repository))]
    #[error(
        "Project folder {} is outside of the repository root.",
        .dir.to_string_lossy().to_string().style(Style::Path),
    )]
    OutsideRepository { dir: PathBuf },
}
