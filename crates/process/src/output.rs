use crate::process_error::ProcessError;
use std::process::Output;

#[inline]
pub fn output_to_string(data: &[u8]) -> String {
    String::from_utf8_lossy(data).to_string()
}

#[inline]
pub fn output_to_trimmed_string(data: &[u8]) -> String {
    output_to_string(data).trim().to_owned()
}

pub fn output_to_error(bin: impl AsRef<str>, output: &Output, with_message: bool) -> ProcessError {
    let bin = bin.as_ref().to_owned();

    let status = match output.status.code() {
        Some(code) => format!("exit code {code}"),
        None => output.status.to_string(),
    };

    if !with_message {
        return ProcessError::ExitNonZero { bin, status };
    }

    let mut message = output_to_trimmed_string(&output.stderr);

    if message.is_empty() {
        message = output_to_trimmed_string(&output.stdout);
    }

    if !message.is_empty() {
        message = format!("\n\n{message}");
    }

    ProcessError::ExitNonZeroWithOutput {
        bin,
        status,
        output: message,
    }
}
