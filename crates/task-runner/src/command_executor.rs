use armada_console::{TaskStream, TaskWriter};
use armada_process::{Command, ProcessError};
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct CommandOutcome {
    pub exit_code: i32,

    /// How many bytes the child wrote to stderr. A zero exit with any
    /// stderr output downgrades success to a warning.
    pub stderr_bytes: usize,

    /// The child was signaled because the run was cancelled.
    pub cancelled: bool,
}

fn pump<R>(mut reader: R, writer: TaskWriter, stream: TaskStream) -> JoinHandle<usize>
where
    R: AsyncReadExt + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut buffer = [0u8; 8192];
        let mut total = 0;

        while let Ok(bytes) = reader.read(&mut buffer).await {
            if bytes == 0 {
                break;
            }

            total += bytes;
            let _ = writer.write(stream, &buffer[..bytes]);
        }

        total
    })
}

/// Spawn the command and pump both stdio pipes chunk-wise through the
/// task's output writer until the child exits. Cancellation kills the
/// child (best-effort) and then still waits, so no zombie is left
/// behind.
pub async fn execute_streamed(
    command: &mut Command,
    writer: &TaskWriter,
    cancel_token: &CancellationToken,
) -> miette::Result<CommandOutcome> {
    let bin = command.get_bin_name();
    let mut child = command.spawn_piped()?;

    let map_error = |error: std::io::Error| ProcessError::Stream {
        bin: bin.clone(),
        error: Box::new(error),
    };

    let stdout_handle = child
        .stdout
        .take()
        .map(|stdout| pump(stdout, writer.clone(), TaskStream::Stdout));

    let stderr_handle = child
        .stderr
        .take()
        .map(|stderr| pump(stderr, writer.clone(), TaskStream::Stderr));

    let mut cancelled = false;

    let status = tokio::select! {
        status = child.wait() => status.map_err(map_error)?,
        _ = cancel_token.cancelled() => {
            debug!(bin = &bin, "Run cancelled, killing child process");

            cancelled = true;

            let _ = child.kill().await;

            child.wait().await.map_err(map_error)?
        }
    };

    // Drain the pipes completely before reporting, so the transcript
    // always holds everything the child wrote
    if let Some(handle) = stdout_handle {
        let _ = handle.await;
    }

    let stderr_bytes = match stderr_handle {
        Some(handle) => handle.await.unwrap_or(0),
        None => 0,
    };

    Ok(CommandOutcome {
        exit_code: status.code().unwrap_or(-1),
        stderr_bytes,
        cancelled,
    })
}
