//! The [`Story`] trait the [`Terminal`](crate::Terminal) drives, the shared
//! [`Clock`] it watches, and [`QueueStory`], the strictly sequential story.

use crate::error::{Error, Result};
use crate::step::{Response, Step};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// What the terminal should do with a line a story just looked at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Write this text, plus a newline, back to the program.
    Write(String),
    /// Nothing to write. Either the step matched with nothing to say, or the
    /// line did not match and was dropped.
    SkipWrite,
    /// There is no step left to match against.
    NoSteps,
}

/// A script engine the terminal can drive.
///
/// The terminal calls [`setup`](Story::setup) once when it starts watching,
/// then on every poll calls [`tick`](Story::tick) and, when a line is ready,
/// [`handle_line`](Story::handle_line). [`teardown`](Story::teardown) runs
/// when watching stops, whatever the outcome.
pub trait Story {
    /// Start the story, returning the clock the terminal checks each poll.
    fn setup(&mut self) -> Result<Clock>;

    /// Release whatever `setup` acquired. Must be safe to call more than once,
    /// and without a successful `setup`.
    fn teardown(&mut self);

    /// Called every poll before any line is handled, even when none arrived.
    fn tick(&mut self) -> Result<()>;

    /// Decide what to do with one line of program output.
    fn handle_line(&mut self, line: &str) -> Result<Reply>;
}

/// Why a [`Clock`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    Cancelled,
    DeadlineExceeded(Duration),
    StepTimedOut { rule: String, timeout: Duration },
    Released,
}

#[derive(Debug, Default)]
struct ClockState {
    armed: bool,
    deadline: Option<(Instant, Duration)>,
    halt: Option<Halt>,
}

/// Shared run clock of a story: an optional overall deadline plus a one-shot
/// halt reason. Clones observe and control the same clock.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    state: Arc<Mutex<ClockState>>,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the clock. Fails if it was armed or halted before.
    pub fn arm(&self, timeout: Option<Duration>) -> Result<()> {
        let mut state = self.lock();
        if state.armed || state.halt.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        state.armed = true;
        state.deadline = timeout
            .filter(|t| !t.is_zero())
            .map(|t| (Instant::now() + t, t));
        Ok(())
    }

    pub fn is_armed(&self) -> bool {
        self.lock().armed
    }

    /// Stop the clock as cancelled, unless it already stopped.
    pub fn cancel(&self) {
        self.halt(Halt::Cancelled);
    }

    /// Stop the clock without marking a failure, unless it already stopped.
    pub fn release(&self) {
        self.halt(Halt::Released);
    }

    /// Record why the clock stopped. The first reason wins.
    pub fn halt(&self, reason: Halt) {
        let mut state = self.lock();
        if state.halt.is_none() {
            state.halt = Some(reason);
        }
    }

    /// The reason the clock stopped, if it did.
    pub fn halted(&self) -> Option<Halt> {
        let mut state = self.lock();
        Self::expire(&mut state);
        state.halt.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.halted().is_some()
    }

    /// `Ok` while the story may keep running. A released clock no longer
    /// gates anything and reports `Ok`.
    pub fn check(&self) -> Result<()> {
        match self.halted() {
            None | Some(Halt::Released) => Ok(()),
            Some(Halt::Cancelled) => Err(Error::Cancelled),
            Some(Halt::DeadlineExceeded(timeout)) => Err(Error::OverallTimeout { timeout }),
            Some(Halt::StepTimedOut { rule, timeout }) => Err(Error::StepTimeout { rule, timeout }),
        }
    }

    fn expire(state: &mut ClockState) {
        if state.halt.is_some() {
            return;
        }
        if let Some((at, timeout)) = state.deadline {
            if Instant::now() >= at {
                state.halt = Some(Halt::DeadlineExceeded(timeout));
            }
        }
    }
}

/// A story whose steps must match one after the other, in order.
///
/// Only the front step is ever tested. Lines that do not match it are dropped.
///
/// ```
/// use ptystory::{QueueStory, Step};
/// use std::time::Duration;
///
/// let mut story = QueueStory::with_timeout(Duration::from_secs(5));
/// story.add([
///     Step::expect("Starting"),
///     Step::expect("Your name:").reply("Henrique"),
///     Step::expect("Your age:").reply("10"),
/// ]);
/// assert_eq!(story.pending(), 3);
/// ```
#[derive(Debug, Default)]
pub struct QueueStory {
    steps: VecDeque<Step>,
    timeout: Option<Duration>,
    last_transition: Option<Instant>,
    clock: Clock,
}

impl QueueStory {
    /// A story with no overall timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// A story that fails once `timeout` has passed since it started.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: (!timeout.is_zero()).then_some(timeout),
            ..Self::default()
        }
    }

    /// Append steps to the end of the queue.
    pub fn add(&mut self, steps: impl IntoIterator<Item = Step>) {
        self.steps.extend(steps);
    }

    pub fn push(&mut self, step: Step) {
        self.steps.push_back(step);
    }

    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout.filter(|t| !t.is_zero());
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Steps not matched yet, current one first.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    pub fn pending(&self) -> usize {
        self.steps.len()
    }

    pub(crate) fn last_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.back_mut()
    }

    /// A handle on this story's clock, usable from another task to cancel a
    /// running `watch`.
    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }

    /// Stop the story. A running `watch` returns within one poll.
    pub fn cancel(&self) {
        self.clock.cancel();
    }

    /// True once every step matched in order, with no timeout or cancel.
    pub fn success(&self) -> bool {
        self.clock.is_armed()
            && self.steps.is_empty()
            && matches!(self.clock.halted(), None | Some(Halt::Released))
    }
}

impl Story for QueueStory {
    fn setup(&mut self) -> Result<Clock> {
        self.clock.arm(self.timeout)?;
        self.last_transition = Some(Instant::now());
        debug!(steps = self.steps.len(), timeout = ?self.timeout, "story started");
        Ok(self.clock.clone())
    }

    fn teardown(&mut self) {
        self.clock.release();
    }

    fn tick(&mut self) -> Result<()> {
        let Some(step) = self.steps.front() else {
            return Ok(());
        };
        let (Some(timeout), Some(since)) = (step.timeout, self.last_transition) else {
            return Ok(());
        };
        if since.elapsed() < timeout {
            return Ok(());
        }

        let rule = step.matcher.to_string();
        self.clock.halt(Halt::StepTimedOut {
            rule: rule.clone(),
            timeout,
        });
        Err(Error::StepTimeout { rule, timeout })
    }

    fn handle_line(&mut self, line: &str) -> Result<Reply> {
        let Some(step) = self.steps.front_mut() else {
            return Ok(Reply::NoSteps);
        };

        let Some(response) = step.evaluate(line) else {
            trace!(line, "line dropped");
            return Ok(Reply::SkipWrite);
        };

        trace!(line, step = %step, "step matched");
        self.steps.pop_front();
        self.last_transition = Some(Instant::now());

        Ok(match response {
            Response::Write(text) => Reply::Write(text),
            Response::Skip => Reply::SkipWrite,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn greeting_story() -> QueueStory {
        let mut story = QueueStory::new();
        story.add([
            Step::expect("Starting"),
            Step::expect("Your name:").reply("Henrique"),
            Step::expect("Your age:").reply("10"),
        ]);
        story
    }

    #[test]
    fn test_matches_in_order() {
        let mut story = greeting_story();
        story.setup().unwrap();

        assert_eq!(story.handle_line("Starting\r").unwrap(), Reply::SkipWrite);
        assert_eq!(
            story.handle_line("Your name: ").unwrap(),
            Reply::Write("Henrique".to_string())
        );
        assert!(!story.success());
        assert_eq!(
            story.handle_line("Your age: ").unwrap(),
            Reply::Write("10".to_string())
        );
        assert!(story.success());
        assert_eq!(story.handle_line("Bye!").unwrap(), Reply::NoSteps);
    }

    #[test]
    fn test_unmatched_lines_are_dropped() {
        let mut story = greeting_story();
        story.setup().unwrap();

        // A later step's line arriving early does not skip ahead.
        assert_eq!(story.handle_line("Your name: ").unwrap(), Reply::SkipWrite);
        assert_eq!(story.pending(), 3);
        assert_eq!(story.handle_line("noise").unwrap(), Reply::SkipWrite);
        assert_eq!(story.handle_line("Starting").unwrap(), Reply::SkipWrite);
        assert_eq!(story.pending(), 2);
    }

    #[test]
    fn test_setup_only_once() {
        let mut story = greeting_story();
        story.setup().unwrap();
        assert!(matches!(story.setup(), Err(Error::AlreadyInitialized)));
        story.teardown();
        assert!(matches!(story.setup(), Err(Error::AlreadyInitialized)));
    }

    #[test]
    fn test_teardown_without_setup_is_harmless() {
        let mut story = greeting_story();
        story.teardown();
        story.teardown();
        assert!(!story.success());
    }

    #[test]
    fn test_success_requires_setup() {
        let story = QueueStory::new();
        assert!(!story.success());
    }

    #[test]
    fn test_empty_story_succeeds_after_setup_and_teardown() {
        let mut story = QueueStory::new();
        story.setup().unwrap();
        story.teardown();
        assert!(story.success());
    }

    #[test]
    fn test_step_timeout_keeps_remaining_steps() {
        let mut story = QueueStory::new();
        story.add([
            Step::expect("Starting"),
            Step::expect("Your age:")
                .reply("10")
                .timeout(Duration::from_millis(20)),
            Step::expect("Bye!"),
        ]);
        story.setup().unwrap();
        story.tick().unwrap();
        story.handle_line("Starting").unwrap();
        story.tick().unwrap();

        sleep(Duration::from_millis(30));
        match story.tick() {
            Err(Error::StepTimeout { rule, timeout }) => {
                assert_eq!(rule, "\"Your age:\"");
                assert_eq!(timeout, Duration::from_millis(20));
            }
            other => panic!("expected step timeout, got {other:?}"),
        }

        assert_eq!(story.pending(), 2);
        assert!(matches!(story.clock().check(), Err(Error::StepTimeout { .. })));
        story.teardown();
        assert!(!story.success());
    }

    #[test]
    fn test_step_timeout_counts_from_last_match() {
        let mut story = QueueStory::new();
        story.add([
            Step::expect("a"),
            Step::expect("b").timeout(Duration::from_millis(40)),
        ]);
        story.setup().unwrap();
        sleep(Duration::from_millis(50));
        story.handle_line("a").unwrap();
        story.tick().unwrap();
    }

    #[test]
    fn test_tick_on_empty_queue_is_noop() {
        let mut story = QueueStory::new();
        story.setup().unwrap();
        sleep(Duration::from_millis(5));
        story.tick().unwrap();
    }

    #[test]
    fn test_overall_deadline() {
        let mut story = QueueStory::with_timeout(Duration::from_millis(20));
        story.push(Step::expect("never"));
        let clock = story.setup().unwrap();
        clock.check().unwrap();
        sleep(Duration::from_millis(30));
        assert!(matches!(
            clock.check(),
            Err(Error::OverallTimeout { timeout }) if timeout == Duration::from_millis(20)
        ));
        story.teardown();
        assert!(!story.success());
        assert_eq!(story.pending(), 1);
    }

    #[test]
    fn test_cancel_is_terminal() {
        let mut story = QueueStory::new();
        let handle = story.clock();
        let clock = story.setup().unwrap();
        handle.cancel();
        assert!(matches!(clock.check(), Err(Error::Cancelled)));
        story.teardown();
        assert!(matches!(clock.check(), Err(Error::Cancelled)));
        assert!(!story.success());
    }

    #[test]
    fn test_cancel_before_setup_blocks_setup() {
        let mut story = greeting_story();
        story.cancel();
        assert!(matches!(story.setup(), Err(Error::AlreadyInitialized)));
    }
}
