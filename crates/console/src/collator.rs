use crate::console::Console;
use crate::normalizer::LineNormalizer;
use console::strip_ansi_codes;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::trace;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TaskStream {
    Stderr,
    Stdout,
}

/// Everything a task wrote, captured independently of how the
/// human-facing stream was collated. Newlines are normalized, terminal
/// color codes are stripped when configured, and a trailing newline is
/// ensured on non-empty streams.
#[derive(Clone, Debug, Default)]
pub struct TaskTranscript {
    pub combined: String,
    pub stderr: String,
    pub stdout: String,
}

struct TaskChannel {
    name: String,
    closed: bool,

    /// Normalized bytes waiting for this task to become the foreground
    /// writer. Flushed as one contiguous segment.
    pending: Vec<u8>,

    err_normalizer: LineNormalizer,
    out_normalizer: LineNormalizer,

    /// Last byte this task put on the human-facing stream (directly or
    /// via its pending segment), used to ensure a trailing newline.
    last_streamed: Option<u8>,

    transcript: TaskTranscript,
}

impl TaskChannel {
    fn new(name: String) -> TaskChannel {
        TaskChannel {
            name,
            closed: false,
            pending: Vec::new(),
            err_normalizer: LineNormalizer::new(),
            out_normalizer: LineNormalizer::new(),
            last_streamed: None,
            transcript: TaskTranscript::default(),
        }
    }
}

#[derive(Default)]
struct CollatorState {
    channels: Vec<TaskChannel>,

    /// The task currently writing through to the human-facing stream.
    foreground: Option<usize>,

    /// Tasks with buffered output, in first-buffered order, awaiting
    /// foreground promotion.
    waiting: Vec<usize>,
}

/// Serializes concurrent per-task output streams onto the human-facing
/// stream. At any instant at most one task is the foreground writer;
/// other tasks' chunks buffer and flush as contiguous segments when the
/// foreground is released. Per-task transcripts are captured on the side,
/// unaffected by segmentation.
pub struct OutputCollator {
    console: Arc<Console>,
    state: Mutex<CollatorState>,
    strip_colors: bool,
}

impl OutputCollator {
    pub fn new(console: Arc<Console>) -> Arc<OutputCollator> {
        Arc::new(OutputCollator {
            console,
            state: Mutex::new(CollatorState::default()),
            strip_colors: true,
        })
    }

    /// Create the writer handle for a task. Handles are the only way a
    /// task's output enters the pipeline.
    pub fn writer(self: &Arc<Self>, name: &str) -> TaskWriter {
        let mut state = self.state.lock();
        let id = state.channels.len();

        trace!(task = name, id, "Opening task output writer");

        state.channels.push(TaskChannel::new(name.to_owned()));

        TaskWriter {
            collator: Arc::clone(self),
            id,
        }
    }

    fn write(&self, id: usize, stream: TaskStream, chunk: &[u8]) -> miette::Result<()> {
        let mut state = self.state.lock();
        let channel = &mut state.channels[id];

        let normalized = match stream {
            TaskStream::Stderr => channel.err_normalizer.normalize(chunk),
            TaskStream::Stdout => channel.out_normalizer.normalize(chunk),
        };

        if normalized.is_empty() {
            return Ok(());
        }

        self.capture(channel, stream, &normalized);

        // In quiet mode only stderr reaches the human-facing stream
        if self.console.is_quiet() && stream == TaskStream::Stdout {
            return Ok(());
        }

        self.route(&mut state, id, normalized)
    }

    fn close(&self, id: usize) -> miette::Result<TaskTranscript> {
        let mut state = self.state.lock();
        let channel = &mut state.channels[id];

        channel.closed = true;

        // A held carriage return at stream end still counts as a newline
        for (stream, byte) in [
            (TaskStream::Stdout, channel.out_normalizer.finish()),
            (TaskStream::Stderr, channel.err_normalizer.finish()),
        ] {
            if let Some(byte) = byte {
                self.capture(&mut state.channels[id], stream, &[byte]);

                if !(self.console.is_quiet() && stream == TaskStream::Stdout) {
                    self.route(&mut state, id, vec![byte])?;
                }
            }
        }

        let channel = &mut state.channels[id];

        // Ensure the streamed segment ends on a newline
        if channel.last_streamed.is_some_and(|byte| byte != b'\n') {
            self.route(&mut state, id, vec![b'\n'])?;
        }

        let channel = &mut state.channels[id];

        for text in [
            &mut channel.transcript.stdout,
            &mut channel.transcript.stderr,
            &mut channel.transcript.combined,
        ] {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
        }

        trace!(task = &channel.name, id, "Closing task output writer");

        let transcript = channel.transcript.clone();

        if state.foreground == Some(id) {
            state.foreground = None;
            self.promote_next(&mut state)?;
        }

        Ok(transcript)
    }

    fn capture(&self, channel: &mut TaskChannel, stream: TaskStream, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        let text = if self.strip_colors {
            strip_ansi_codes(&text).to_string()
        } else {
            text.to_string()
        };

        match stream {
            TaskStream::Stderr => channel.transcript.stderr.push_str(&text),
            TaskStream::Stdout => channel.transcript.stdout.push_str(&text),
        };

        channel.transcript.combined.push_str(&text);
    }

    /// Route normalized bytes onto the human-facing stream: write through
    /// when we are (or can become) the foreground writer, buffer
    /// otherwise.
    fn route(&self, state: &mut CollatorState, id: usize, bytes: Vec<u8>) -> miette::Result<()> {
        match state.foreground {
            Some(foreground) if foreground == id => {
                state.channels[id].last_streamed = bytes.last().copied();

                self.console.out.write(bytes)?;
            }
            Some(_) => {
                if state.channels[id].pending.is_empty() && !state.waiting.contains(&id) {
                    state.waiting.push(id);
                }

                let channel = &mut state.channels[id];
                channel.last_streamed = bytes.last().copied();
                channel.pending.extend(bytes);
            }
            None => {
                state.foreground = Some(id);
                state.channels[id].last_streamed = bytes.last().copied();

                self.console.out.write(bytes)?;
            }
        }

        Ok(())
    }

    /// Flush waiting tasks' segments in claim order. Closed tasks flush
    /// and release immediately; the first still-open task becomes the new
    /// foreground writer.
    fn promote_next(&self, state: &mut CollatorState) -> miette::Result<()> {
        while !state.waiting.is_empty() {
            let id = state.waiting.remove(0);
            let channel = &mut state.channels[id];
            let pending = std::mem::take(&mut channel.pending);
            let closed = channel.closed;

            if !pending.is_empty() {
                self.console.out.write(pending)?;
            }

            if !closed {
                state.foreground = Some(id);
                break;
            }
        }

        Ok(())
    }
}

/// Cloneable handle through which one task writes its output. Cloned
/// once per stdio stream; closing flushes buffered content and releases
/// any foreground claim.
#[derive(Clone)]
pub struct TaskWriter {
    collator: Arc<OutputCollator>,
    id: usize,
}

impl TaskWriter {
    pub fn write(&self, stream: TaskStream, chunk: &[u8]) -> miette::Result<()> {
        self.collator.write(self.id, stream, chunk)
    }

    pub fn close(&self) -> miette::Result<TaskTranscript> {
        self.collator.close(self.id)
    }
}
