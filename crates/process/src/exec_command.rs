use crate::command::Command;
use crate::output::output_to_error;
use crate::process_error::ProcessError;
use armada_common::color;
use std::ffi::{OsStr, OsString};
use std::process::{Output, Stdio};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command as AsyncCommand};
use tracing::debug;

impl Command {
    /// Execute and capture both output streams, waiting for exit.
    pub async fn exec_capture_output(&mut self) -> miette::Result<Output> {
        let mut command = self.create_async_command();
        let output: Output;

        if self.should_pass_stdin() {
            let mut child = command
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(|error| ProcessError::Capture {
                    bin: self.get_bin_name(),
                    error: Box::new(error),
                })?;

            self.write_input_to_child(&mut child).await?;

            output = child
                .wait_with_output()
                .await
                .map_err(|error| ProcessError::Capture {
                    bin: self.get_bin_name(),
                    error: Box::new(error),
                })?;
        } else {
            output = command
                .output()
                .await
                .map_err(|error| ProcessError::Capture {
                    bin: self.get_bin_name(),
                    error: Box::new(error),
                })?;
        }

        self.handle_nonzero_status(&output)?;

        Ok(output)
    }

    /// Spawn with both output streams piped, for callers that stream
    /// chunks as they arrive. The caller owns waiting and exit handling.
    pub fn spawn_piped(&mut self) -> miette::Result<Child> {
        let mut command = self.create_async_command();

        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| {
                ProcessError::Stream {
                    bin: self.get_bin_name(),
                    error: Box::new(error),
                }
                .into()
            })
    }

    fn create_async_command(&self) -> AsyncCommand {
        let line = self.create_command_line();

        debug!(
            cwd = ?self.cwd,
            "Running command {}",
            color::shell(
                line.iter()
                    .map(|part| part.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" ")
            ),
        );

        let mut command = AsyncCommand::new(&line[0]);
        command.args(&line[1..]);
        command.kill_on_drop(true);

        for (key, value) in &self.env {
            if let Some(value) = value {
                command.env(key, value);
            } else {
                command.env_remove(key);
            }
        }

        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        command
    }

    /// When wrapped in a shell, the shell binary and its arguments lead
    /// the line and the command collapses into a single script argument.
    fn create_command_line(&self) -> Vec<OsString> {
        let mut line: Vec<OsString> = vec![];

        if let Some(shell) = &self.shell {
            line.push(shell.bin.clone());
            line.extend(shell.args.iter().cloned());

            let mut script = self.bin.clone();

            for arg in &self.args {
                script.push(" ");
                script.push(arg);
            }

            line.push(script);
        } else {
            line.push(self.bin.clone());
            line.extend(self.args.iter().cloned());
        }

        line
    }

    fn handle_nonzero_status(&mut self, output: &Output) -> miette::Result<()> {
        if self.should_error_nonzero() && !output.status.success() {
            return Err(output_to_error(self.get_bin_name(), output, true).into());
        }

        Ok(())
    }

    async fn write_input_to_child(&self, child: &mut Child) -> miette::Result<()> {
        let input = self.input.join(OsStr::new(" "));

        let mut stdin = child.stdin.take().ok_or_else(|| ProcessError::WriteInput {
            bin: self.get_bin_name(),
            error: Box::new(std::io::Error::other("stdin has already been taken")),
        })?;

        stdin
            .write_all(input.as_encoded_bytes())
            .await
            .map_err(|error| ProcessError::WriteInput {
                bin: self.get_bin_name(),
                error: Box::new(error),
            })?;

        drop(stdin);

        Ok(())
    }
}
