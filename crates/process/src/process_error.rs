use armada_common::{Style, Stylize};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum ProcessError {
    #[diagnostic(code(process::capture::failed))]
    #[error("Failed to execute {} and capture output.", .bin.style(Style::Shell))]
    Capture {
        bin: String,
        #[source]
        error: Box<std::io::Error>,
    },

    #[diagnostic(code(process::failed))]
    #[error("Process {} failed: {status}", .bin.style(Style::Shell))]
    ExitNonZero { bin: String, status: String },

    #[diagnostic(code(process::failed))]
    #[error(
        "Process {} failed: {status} {}",
        .bin.style(Style::Shell),
        .output.style(Style::MutedLight),
    )]
    ExitNonZeroWithOutput {
        bin: String,
        status: String,
        output: String,
    },

    #[diagnostic(code(process::stream::failed))]
    #[error("Failed to execute {} and stream output.", .bin.style(Style::Shell))]
    Stream {
        bin: String,
        #[source]
        error: Box<std::io::Error>,
    },

    #[diagnostic(code(process::write_input::failed))]
    #[error("Failed to write stdin to {}.", .bin.style(Style::Shell))]
    WriteInput {
        bin: String,
        #[source]
        error: Box<std::io::Error>,
    },
}
