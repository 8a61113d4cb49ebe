//! # ptystory
//!
//! Drive an interactive command-line program through a pseudo-terminal and
//! check it behaves: wait for lines of output, answer them, fail on timeouts.
//!
//! A [`Terminal`] runs one program in a PTY. A [`QueueStory`] is an ordered
//! list of [`Step`]s, each recognising one line and optionally answering it.
//! [`Terminal::watch`] drives the story against the program's output until
//! the program exits, the story times out, or it is cancelled.
//!
//! ## Quick start
//!
//! ```no_run
//! use ptystory::{CommandSpec, QueueStory, Step, Terminal};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> ptystory::Result<()> {
//!     let mut term = Terminal::new(CommandSpec::new("./signup.sh"))
//!         .echo(std::io::stdout());
//!
//!     let mut story = QueueStory::with_timeout(Duration::from_secs(5));
//!     story.add([
//!         Step::expect("Starting"),
//!         Step::expect("Your name:").reply("Henrique"),
//!         Step::expect("Your age:").reply("10"),
//!     ]);
//!
//!     term.run(&mut story).await?;
//!     assert!(story.success());
//!     Ok(())
//! }
//! ```
//!
//! ## Matching rules
//!
//! | Constructor | Matches when |
//! |-------------|--------------|
//! | [`Step::expect`] | the line equals the text, surrounding whitespace ignored |
//! | [`Step::regex`] / [`Step::pattern`] | the pattern matches anywhere in the raw line |
//! | [`Step::when`] | the closure returns `true` (it may capture values) |
//!
//! Only the step at the front of the queue is tested. A line that does not
//! match it is dropped, never retried.
//!
//! ## Timeouts and cancellation
//!
//! [`QueueStory::with_timeout`] bounds the whole story; [`Step::timeout`]
//! bounds the time a single step may stay unmatched. Either failing ends
//! `watch` with an error and leaves the unmatched steps in the queue.
//! [`QueueStory::clock`] hands out a [`Clock`] that another task can use to
//! cancel a running `watch`.
//!
//! ## Script files
//!
//! Stories can also be written as scripts and loaded with [`parse_story`]:
//!
//! | Directive | Description |
//! |-----------|-------------|
//! | `timeout 5s` | Overall story timeout |
//! | `expect "text"` | Step waiting for a literal line |
//! | `expect "text" 2s` | Same, failing if not seen within 2 seconds |
//! | `match "regex"` | Step waiting for a line the pattern matches |
//! | `reply "text"` | Answer for the step just above |
//! | `# comment` | Full-line or inline comment |
//!
//! ## Custom stories
//!
//! Implement [`Story`] to drive a program with something other than a fixed
//! queue, e.g. a looping or branching script.

pub mod directive;
pub mod directives;
pub mod error;
pub mod parser;
pub(crate) mod line_buffer;
pub mod pty;
pub mod step;
pub mod story;
pub mod terminal;
pub mod transcript;

pub use directive::Directive;
pub use error::{Error, Result};
pub use parser::{build_story, parse_file, parse_story, parse_str};
pub use portable_pty::ExitStatus;
pub use pty::{CommandSpec, EOT};
pub use step::{Matcher, Response, Step};
pub use story::{Clock, Halt, QueueStory, Reply, Story};
pub use terminal::{ExitHandle, Terminal, TerminalConfig};
pub use transcript::Transcript;
