use armada_common::{Style, Stylize};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CacheError {
    #[diagnostic(code(cache::restore_failed))]
    #[error(
        "Failed to restore cached outputs for {}: {error}",
        .fingerprint.style(Style::Hash),
    )]
    RestoreFailed { fingerprint: String, error: String },

    #[diagnostic(code(cache::store_failed))]
    #[error(
        "Failed to archive outputs for {}: {error}",
        .fingerprint.style(Style::Hash),
    )]
    StoreFailed { fingerprint: String, error: String },
}
