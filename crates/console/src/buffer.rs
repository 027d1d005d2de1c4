use parking_lot::Mutex;
use std::io::{self, IsTerminal, Write};
use std::mem;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{sleep, spawn, JoinHandle};
use std::time::Duration;

#[derive(Clone, Copy)]
pub enum ConsoleStream {
    Stderr,
    Stdout,
}

enum FlushTarget {
    Captured(Arc<Mutex<Vec<u8>>>),
    Native(ConsoleStream),
}

/// A buffered terminal stream. Writes accumulate in memory and are
/// flushed by a background thread on an interval, or eagerly once the
/// buffer grows past a threshold, so that many small task chunks do not
/// turn into many small syscalls.
pub struct ConsoleBuffer {
    buffer: Arc<Mutex<Vec<u8>>>,
    channel: Option<Sender<bool>>,
    handle: Option<JoinHandle<()>>,
    stream: ConsoleStream,
    target: Arc<FlushTarget>,
}

impl ConsoleBuffer {
    pub fn new(stream: ConsoleStream) -> Self {
        Self::internal_new(stream, Arc::new(FlushTarget::Native(stream)), true)
    }

    /// A buffer that flushes into memory instead of the real terminal,
    /// immediately on write. Used by tests to assert on emitted output.
    pub fn new_captured(stream: ConsoleStream) -> Self {
        let captured = Arc::new(Mutex::new(Vec::new()));

        Self::internal_new(stream, Arc::new(FlushTarget::Captured(captured)), false)
    }

    fn internal_new(stream: ConsoleStream, target: Arc<FlushTarget>, with_handle: bool) -> Self {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let (tx, rx) = mpsc::channel();

        let handle = if with_handle {
            let buffer_clone = Arc::clone(&buffer);
            let target_clone = Arc::clone(&target);

            Some(spawn(move || flush_on_loop(buffer_clone, target_clone, rx)))
        } else {
            None
        };

        Self {
            buffer,
            channel: Some(tx),
            handle,
            stream,
            target,
        }
    }

    pub fn is_terminal(&self) -> bool {
        match self.stream {
            ConsoleStream::Stderr => io::stderr().is_terminal(),
            ConsoleStream::Stdout => io::stdout().is_terminal(),
        }
    }

    /// Content flushed so far, when built with `new_captured`.
    pub fn captured_content(&self) -> Option<String> {
        match self.target.as_ref() {
            FlushTarget::Captured(captured) => {
                Some(String::from_utf8_lossy(&captured.lock()).to_string())
            }
            FlushTarget::Native(_) => None,
        }
    }

    pub fn close(&self) -> miette::Result<()> {
        self.flush()?;

        if let Some(channel) = &self.channel {
            let _ = channel.send(true);
        }

        Ok(())
    }

    pub fn flush(&self) -> miette::Result<()> {
        flush(&mut self.buffer.lock(), &self.target)
            .map_err(|error| miette::miette!("Failed to flush console buffer: {error}"))?;

        Ok(())
    }

    pub fn write<T: AsRef<[u8]>>(&self, data: T) -> miette::Result<()> {
        let data = data.as_ref();

        if data.is_empty() {
            return Ok(());
        }

        let mut buffer = self.buffer.lock();

        buffer.extend_from_slice(data);

        // Captured buffers flush eagerly, native ones once large enough
        if matches!(self.target.as_ref(), FlushTarget::Captured(_)) || buffer.len() >= 1024 {
            flush(&mut buffer, &self.target)
                .map_err(|error| miette::miette!("Failed to flush console buffer: {error}"))?;
        }

        Ok(())
    }

    pub fn write_line<T: AsRef<[u8]>>(&self, data: T) -> miette::Result<()> {
        let mut line = data.as_ref().to_vec();
        line.push(b'\n');

        self.write(line)
    }

    pub fn write_newline(&self) -> miette::Result<()> {
        self.write("\n")
    }
}

impl Drop for ConsoleBuffer {
    fn drop(&mut self) {
        let _ = self.close();

        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn flush(buffer: &mut Vec<u8>, target: &FlushTarget) -> io::Result<()> {
    if buffer.is_empty() {
        return Ok(());
    }

    let data = mem::take(buffer);

    match target {
        FlushTarget::Captured(captured) => {
            captured.lock().extend_from_slice(&data);
            Ok(())
        }
        FlushTarget::Native(ConsoleStream::Stderr) => io::stderr().lock().write_all(&data),
        FlushTarget::Native(ConsoleStream::Stdout) => io::stdout().lock().write_all(&data),
    }
}

fn flush_on_loop(
    buffer: Arc<Mutex<Vec<u8>>>,
    target: Arc<FlushTarget>,
    receiver: Receiver<bool>,
) {
    loop {
        sleep(Duration::from_millis(100));

        let _ = flush(&mut buffer.lock(), &target);

        match receiver.try_recv() {
            Ok(true) | Err(TryRecvError::Disconnected) => {
                break;
            }
            _ => {}
        }
    }
}
