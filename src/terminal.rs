//! [`Terminal`] — runs one program in a PTY and drives a [`Story`] against
//! its output.

use crate::error::{Error, Result};
use crate::line_buffer::LineBuffer;
use crate::pty::{CommandSpec, EOT, PtySession};
use crate::story::{Clock, Reply, Story};
use portable_pty::ExitStatus;
use std::io::{ErrorKind, Write};
use std::thread;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Tuning knobs for the read/match/write loop.
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// How long `watch` sleeps when a poll found no line to handle.
    pub poll_interval: Duration,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

/// Awaits the exit of a started program. Cheap to clone; every clone sees the
/// same exit status.
#[derive(Debug, Clone)]
pub struct ExitHandle {
    rx: watch::Receiver<Option<ExitStatus>>,
}

impl ExitHandle {
    /// The exit status, if the program has already exited.
    pub fn status(&self) -> Option<ExitStatus> {
        self.rx.borrow().clone()
    }

    /// Wait for the program to exit.
    pub async fn wait(&self) -> Result<ExitStatus> {
        let mut rx = self.rx.clone();
        let status = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| std::io::Error::other("exit waiter stopped without a status"))?;
        Ok(status.clone().unwrap_or_else(|| ExitStatus::with_exit_code(1)))
    }
}

struct Session {
    pty: PtySession,
    lines: LineBuffer,
    exit: ExitHandle,
}

enum Unit {
    /// A line was handled; more may be buffered already.
    Progress,
    /// Nothing to handle this time.
    Idle,
    /// The program exited; nothing more will arrive.
    End,
}

/// A program running inside a pseudo-terminal.
///
/// ```no_run
/// use ptystory::{CommandSpec, QueueStory, Step, Terminal, Transcript};
/// use std::time::Duration;
///
/// # async fn demo() -> ptystory::Result<()> {
/// let transcript = Transcript::new();
/// let mut term = Terminal::new(CommandSpec::new("./wizard.sh"))
///     .echo(transcript.clone());
///
/// let mut story = QueueStory::with_timeout(Duration::from_secs(5));
/// story.add([
///     Step::expect("Starting"),
///     Step::expect("Your name:").reply("Henrique"),
///     Step::expect("Your age:").reply("10"),
/// ]);
///
/// term.run(&mut story).await?;
/// assert!(story.success());
/// println!("{:?}", term.wait().await?);
/// # Ok(())
/// # }
/// ```
pub struct Terminal {
    command: CommandSpec,
    config: TerminalConfig,
    echo: Option<Box<dyn Write + Send>>,
    session: Option<Session>,
}

impl Terminal {
    pub fn new(command: CommandSpec) -> Self {
        Self {
            command,
            config: TerminalConfig::default(),
            echo: None,
            session: None,
        }
    }

    /// Mirror everything the program prints, byte for byte, to `sink`.
    pub fn echo(mut self, sink: impl Write + Send + 'static) -> Self {
        self.echo = Some(Box::new(sink));
        self
    }

    pub fn config(mut self, config: TerminalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn command(&self) -> &CommandSpec {
        &self.command
    }

    fn session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(Error::NotStarted)
    }

    fn session_mut(&mut self) -> Result<&mut Session> {
        self.session.as_mut().ok_or(Error::NotStarted)
    }

    /// Spawn the program, then start copying its output and waiting for it to
    /// exit in the background. A terminal runs at most one program.
    pub fn start(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let (pty, reader, mut child) = PtySession::spawn(&self.command).map_err(Error::Spawn)?;
        let pid = child.process_id();
        debug!(program = ?self.command.program, pid, "program started");

        let lines = LineBuffer::spawn(reader, self.echo.take());

        let (tx, rx) = watch::channel(None);
        thread::spawn(move || {
            // Only the fact that the program is gone matters here, not how.
            let status = child.wait().unwrap_or_else(|err| {
                debug!(error = %err, "waiting on program failed");
                ExitStatus::with_exit_code(1)
            });
            debug!(pid, status = ?status, "program exited");
            tx.send_replace(Some(status));
        });

        self.session = Some(Session {
            pty,
            lines,
            exit: ExitHandle { rx },
        });
        Ok(())
    }

    /// Hang up: send one EOT, close the terminal and SIGHUP the program,
    /// unless it has already exited, in which case this does nothing. Writes
    /// fail with [`Error::Closed`] afterwards.
    pub fn stop(&mut self) -> Result<()> {
        let session = self.session_mut()?;
        if session.exit.status().is_some() {
            return Ok(());
        }
        debug!("hanging up");
        session.pty.hang_up()?;
        Ok(())
    }

    /// Wait for the program to exit and return its status.
    pub async fn wait(&self) -> Result<ExitStatus> {
        self.exit_handle()?.wait().await
    }

    /// The exit status, if the program has already exited.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.session.as_ref().and_then(|s| s.exit.status())
    }

    /// A handle another task can await exit on while this terminal is busy.
    pub fn exit_handle(&self) -> Result<ExitHandle> {
        Ok(self.session()?.exit.clone())
    }

    /// Kind of the first error hit while mirroring output to the echo sink.
    pub fn mirror_error(&self) -> Option<ErrorKind> {
        self.session.as_ref().and_then(|s| s.lines.mirror_error())
    }

    /// Write raw bytes to the program.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        let session = self.session_mut()?;
        if session.pty.is_closed() {
            return Err(Error::Closed);
        }
        Ok(session.pty.write(data)?)
    }

    pub fn write_str(&mut self, text: &str) -> Result<usize> {
        self.write(text.as_bytes())
    }

    /// Write `text` followed by a newline.
    pub fn write_line(&mut self, text: &str) -> Result<usize> {
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        self.write(line.as_bytes())
    }

    /// Send EOT (Ctrl+D) without closing the input side.
    pub fn write_eot(&mut self) -> Result<usize> {
        self.write(&[EOT])
    }

    pub fn resize(&self, rows: u16, cols: u16) -> Result<()> {
        let session = self.session()?;
        if session.pty.is_closed() {
            return Err(Error::Closed);
        }
        session.pty.resize(rows, cols).map_err(Error::Other)
    }

    /// Drive `story` against the program's output until the program exits,
    /// the story's clock stops it, or an error occurs.
    ///
    /// Every poll ticks the story and hands it at most one line; replies are
    /// written back followed by a newline. The story is torn down on return.
    pub async fn watch<S>(&mut self, story: &mut S) -> Result<()>
    where
        S: Story + ?Sized,
    {
        let result = match story.setup() {
            Ok(clock) => self.drive(story, &clock).await,
            Err(err) => Err(err),
        };
        story.teardown();
        result
    }

    async fn drive<S>(&mut self, story: &mut S, clock: &Clock) -> Result<()>
    where
        S: Story + ?Sized,
    {
        loop {
            clock.check()?;
            match self.poll_once(story)? {
                Unit::Progress => tokio::task::yield_now().await,
                Unit::Idle => tokio::time::sleep(self.config.poll_interval).await,
                Unit::End => return Ok(()),
            }
        }
    }

    fn poll_once<S>(&mut self, story: &mut S) -> Result<Unit>
    where
        S: Story + ?Sized,
    {
        let session = self.session_mut()?;
        if session.exit.status().is_some() {
            return Ok(Unit::End);
        }

        let line = session.lines.drain_line()?;
        story.tick()?;

        let Some(line) = line else {
            return Ok(Unit::Idle);
        };

        match story.handle_line(&line)? {
            Reply::Write(text) => {
                self.write_line(&text)?;
            }
            Reply::SkipWrite | Reply::NoSteps => {}
        }
        Ok(Unit::Progress)
    }

    /// `start`, `watch`, then `stop` whatever `watch` returned. Failures of
    /// either phase come back together as [`Error::Run`].
    pub async fn run<S>(&mut self, story: &mut S) -> Result<()>
    where
        S: Story + ?Sized,
    {
        self.start()?;
        let watched = self.watch(story).await;
        let stopped = self.stop();

        match (watched, stopped) {
            (Ok(()), Ok(())) => Ok(()),
            (watched, stopped) => Err(Error::Run {
                watch: watched.err().map(Box::new),
                stop: stopped.err().map(Box::new),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QueueStory, Step};

    #[test]
    fn test_operations_need_a_started_terminal() {
        let mut term = Terminal::new(CommandSpec::new("cat"));
        assert!(matches!(term.stop(), Err(Error::NotStarted)));
        assert!(matches!(term.write_line("x"), Err(Error::NotStarted)));
        assert!(matches!(term.exit_handle(), Err(Error::NotStarted)));
        assert!(term.exit_status().is_none());
    }

    #[tokio::test]
    async fn test_watch_without_start_tears_story_down() {
        let mut term = Terminal::new(CommandSpec::new("cat"));
        let mut story = QueueStory::new();
        story.push(Step::expect("x"));
        assert!(matches!(term.watch(&mut story).await, Err(Error::NotStarted)));
        assert!(!story.success());
        assert!(story.clock().is_halted());
    }

    #[tokio::test]
    async fn test_run_reports_spawn_failure_directly() {
        let mut term = Terminal::new(CommandSpec::new("/definitely/not/a/program"));
        let mut story = QueueStory::new();
        assert!(matches!(term.run(&mut story).await, Err(Error::Spawn(_))));
    }
}
