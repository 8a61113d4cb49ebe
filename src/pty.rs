use anyhow::{Context, Result};
use portable_pty::{Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// End Of Transmission, what a terminal sends for Ctrl+D.
pub const EOT: u8 = 0x04;

/// What to run inside the PTY and how big the terminal should be.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(OsString, OsString)>,
    pub rows: u16,
    pub cols: u16,
}

impl CommandSpec {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            rows: 24,
            cols: 80,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn size(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    fn to_builder(&self) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&self.program);
        for arg in &self.args {
            cmd.arg(arg);
        }
        if let Some(dir) = &self.cwd {
            cmd.cwd(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// The controlling side of a program running inside a PTY
pub struct PtySession {
    master: Option<Box<dyn MasterPty + Send>>,
    writer: Box<dyn Write + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    closed: bool,
}

impl PtySession {
    /// Spawn a program in a PTY, returning the session, the output reader
    /// and the child handle separately
    pub fn spawn(
        spec: &CommandSpec,
    ) -> Result<(Self, Box<dyn Read + Send>, Box<dyn Child + Send + Sync>)> {
        let pty_system = portable_pty::native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows: spec.rows,
                cols: spec.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to open PTY")?;

        let child = pair
            .slave
            .spawn_command(spec.to_builder())
            .with_context(|| format!("Failed to spawn {:?}", spec.program))?;

        let writer = pair
            .master
            .take_writer()
            .context("Failed to get PTY writer")?;

        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to get PTY reader")?;

        // The slave end is dropped with `pair`, so the reader sees EOF once the
        // child goes away.
        let session = PtySession {
            master: Some(pair.master),
            writer,
            killer: child.clone_killer(),
            closed: false,
        };

        Ok((session, reader, child))
    }

    /// Write data to the program's stdin
    pub fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed());
        }
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(data.len())
    }

    /// Whether `hang_up` already closed the input side
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Send a single EOT, close the master and SIGHUP the program. Does
    /// nothing once closed.
    ///
    /// The writer itself stays open: portable-pty's writer sends another
    /// newline and EOF when dropped, which a still-running program would read
    /// as an extra empty line.
    pub fn hang_up(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let sent = self.writer.write_all(&[EOT]).and_then(|()| self.writer.flush());
        self.master = None;

        // The output reader holds its own handle on the master, so closing
        // ours does not hang the terminal up by itself.
        match self.killer.kill() {
            Err(err) if err.raw_os_error() != Some(ESRCH) => return Err(err),
            _ => {}
        }
        sent
    }

    /// Resize the PTY
    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        let master = self.master.as_ref().ok_or_else(closed)?;
        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        master.resize(size)?;
        Ok(())
    }
}

/// "No such process": the program was reaped before the hang up reached it.
const ESRCH: i32 = 3;

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "pty input closed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("sh")
            .arg("-c")
            .args(["echo hi"])
            .env("LANG", "C")
            .cwd("/tmp")
            .size(40, 120);
        assert_eq!(spec.program, "sh");
        assert_eq!(spec.args, vec![OsString::from("-c"), OsString::from("echo hi")]);
        assert_eq!(spec.env.len(), 1);
        assert_eq!(spec.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!((spec.rows, spec.cols), (40, 120));
    }

    #[test]
    fn test_default_size() {
        let spec = CommandSpec::new("cat");
        assert_eq!((spec.rows, spec.cols), (24, 80));
    }
}
