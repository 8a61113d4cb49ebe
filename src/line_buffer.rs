use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use tracing::{debug, trace};

enum CopyState {
    Running,
    Eof,
    Failed(io::Error),
}

struct Shared {
    bytes: Vec<u8>,
    copy: CopyState,
    mirror_error: Option<io::Error>,
}

/// Accumulates PTY output into lines while a background thread keeps it fed.
pub struct LineBuffer {
    shared: Arc<Mutex<Shared>>,
    // Length of the newline-less tail seen on the previous drain.
    pending_tail: usize,
}

impl LineBuffer {
    /// Spawns a background thread copying `reader` into the buffer, mirroring
    /// every chunk to `mirror` first when one is given.
    pub fn spawn<R>(mut reader: R, mut mirror: Option<Box<dyn Write + Send>>) -> Self
    where
        R: Read + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(Shared {
            bytes: Vec::new(),
            copy: CopyState::Running,
            mirror_error: None,
        }));
        let feed = Arc::clone(&shared);

        thread::spawn(move || {
            let mut buffer = [0u8; 4096];
            let outcome = loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break CopyState::Eof,
                    Ok(n) => {
                        let chunk = &buffer[..n];
                        if let Some(sink) = mirror.as_mut() {
                            if let Err(err) = sink.write_all(chunk).and_then(|()| sink.flush()) {
                                debug!(error = %err, "mirror write failed, mirroring stopped");
                                lock(&feed).mirror_error = Some(err);
                                mirror = None;
                            }
                        }
                        lock(&feed).bytes.extend_from_slice(chunk);
                    }
                    Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                    Err(err) if is_hangup(&err) => break CopyState::Eof,
                    Err(err) => break CopyState::Failed(err),
                }
            };
            trace!("pty output copier finished");
            lock(&feed).copy = outcome;
        });

        LineBuffer {
            shared,
            pending_tail: 0,
        }
    }

    /// Takes the next line out of the buffer, without its trailing `\n`.
    ///
    /// A tail with no newline (typically a prompt waiting for input) is handed
    /// out once it has stayed unchanged since the previous call, or as soon as
    /// the stream has ended. `Ok(None)` means nothing is ready yet. A copy
    /// failure other than end-of-stream is returned once.
    pub fn drain_line(&mut self) -> io::Result<Option<String>> {
        let mut shared = lock(&self.shared);

        if let Some(pos) = shared.bytes.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = shared.bytes.drain(..=pos).collect();
            self.pending_tail = 0;
            return Ok(Some(String::from_utf8_lossy(&line[..pos]).into_owned()));
        }

        if matches!(shared.copy, CopyState::Failed(_)) {
            if let CopyState::Failed(err) = std::mem::replace(&mut shared.copy, CopyState::Eof) {
                return Err(err);
            }
        }

        if shared.bytes.is_empty() {
            self.pending_tail = 0;
            return Ok(None);
        }

        let ended = matches!(shared.copy, CopyState::Eof);
        if ended || shared.bytes.len() == self.pending_tail {
            let tail = std::mem::take(&mut shared.bytes);
            self.pending_tail = 0;
            return Ok(Some(String::from_utf8_lossy(&tail).into_owned()));
        }

        self.pending_tail = shared.bytes.len();
        Ok(None)
    }

    /// Kind of the first error hit while mirroring, if any
    pub fn mirror_error(&self) -> Option<ErrorKind> {
        lock(&self.shared).mirror_error.as_ref().map(io::Error::kind)
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

// Reading a PTY master on Linux fails with EIO once the slave side is gone.
fn is_hangup(err: &io::Error) -> bool {
    cfg!(unix) && err.raw_os_error() == Some(5)
}
