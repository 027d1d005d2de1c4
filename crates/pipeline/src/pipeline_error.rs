use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum PipelineError {
    /// A user-visible message was already written to the console; the
    /// caller should exit non-zero without reporting again.
    #[diagnostic(code(pipeline::already_reported))]
    #[error("Tasks failed. Details were reported above.")]
    AlreadyReported,
}
