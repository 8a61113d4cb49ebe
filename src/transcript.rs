//! [`Transcript`] — an in-memory observer sink for captured PTY output.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Cloneable byte sink: hand one clone to [`Terminal::echo`](crate::Terminal::echo)
/// and keep another to read back exactly what the program printed.
#[derive(Clone, Default)]
pub struct Transcript {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw bytes captured so far.
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Captured output as text, invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    /// Captured output with the terminal's `\r\n` line endings folded to `\n`.
    pub fn normalized(&self) -> String {
        self.text().replace("\r\n", "\n")
    }
}

impl Write for Transcript {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcript")
            .field("len", &self.bytes().len())
            .finish()
    }
}
