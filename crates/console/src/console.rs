use crate::buffer::{ConsoleBuffer, ConsoleStream};
use std::sync::Arc;

/// The human-facing terminal. Task output is collated onto `out`; the
/// scheduler's own checkpoint and summary lines go to `err` so that task
/// output remains pipeable.
pub struct Console {
    pub err: ConsoleBuffer,
    pub out: ConsoleBuffer,

    quiet: bool,
}

impl Console {
    pub fn new(quiet: bool) -> Arc<Console> {
        Arc::new(Console {
            err: ConsoleBuffer::new(ConsoleStream::Stderr),
            out: ConsoleBuffer::new(ConsoleStream::Stdout),
            quiet,
        })
    }

    /// A console that captures into memory instead of the terminal.
    pub fn new_testing(quiet: bool) -> Arc<Console> {
        Arc::new(Console {
            err: ConsoleBuffer::new_captured(ConsoleStream::Stderr),
            out: ConsoleBuffer::new_captured(ConsoleStream::Stdout),
            quiet,
        })
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn close(&self) -> miette::Result<()> {
        self.err.close()?;
        self.out.close()?;

        Ok(())
    }
}
