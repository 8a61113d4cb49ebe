//! [`Step`] — one scripted exchange: a rule to recognise a line, and what to
//! answer when it shows up.

use regex::Regex;
use std::fmt;
use std::time::Duration;

type Predicate = Box<dyn FnMut(&str) -> bool + Send>;

/// How a step recognises the line it is waiting for.
pub enum Matcher {
    /// Equal to the text once surrounding whitespace is trimmed on both sides.
    Literal(String),
    /// The pattern matches anywhere in the raw line.
    Regex(Regex),
    /// Arbitrary test over the raw line. It may capture values as it goes.
    Predicate(Predicate),
}

impl Matcher {
    /// Whether `line` satisfies this rule.
    pub fn matches(&mut self, line: &str) -> bool {
        match self {
            Matcher::Literal(text) => line.trim() == text.trim(),
            Matcher::Regex(pattern) => pattern.is_match(line),
            Matcher::Predicate(check) => check(line),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal(text) => write!(f, "{text:?}"),
            Matcher::Regex(pattern) => write!(f, "/{}/", pattern.as_str()),
            Matcher::Predicate(_) => f.write_str("<predicate>"),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// What to do once a step matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Write the text followed by a newline.
    Write(String),
    /// Consume the line without writing anything.
    Skip,
}

/// One expectation in a [`QueueStory`](crate::QueueStory).
///
/// ```
/// use ptystory::Step;
/// use std::time::Duration;
///
/// let step = Step::expect("Your name:")
///     .reply("Henrique")
///     .timeout(Duration::from_secs(2));
/// assert_eq!(step.to_string(), "\"Your name:\"");
/// ```
#[derive(Debug)]
pub struct Step {
    pub(crate) matcher: Matcher,
    pub(crate) response: Response,
    pub(crate) timeout: Option<Duration>,
}

impl Step {
    fn with_matcher(matcher: Matcher) -> Self {
        Self {
            matcher,
            response: Response::Skip,
            timeout: None,
        }
    }

    /// Wait for a line equal to `text`, ignoring surrounding whitespace.
    pub fn expect(text: impl Into<String>) -> Self {
        Self::with_matcher(Matcher::Literal(text.into()))
    }

    /// Wait for a line the regular expression matches.
    pub fn regex(pattern: Regex) -> Self {
        Self::with_matcher(Matcher::Regex(pattern))
    }

    /// Compile `pattern` and wait for a line it matches.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::regex(Regex::new(pattern)?))
    }

    /// Wait for a line `check` accepts.
    pub fn when<F>(check: F) -> Self
    where
        F: FnMut(&str) -> bool + Send + 'static,
    {
        Self::with_matcher(Matcher::Predicate(Box::new(check)))
    }

    /// Answer with `text` (plus a newline) once matched.
    pub fn reply(mut self, text: impl Into<String>) -> Self {
        self.response = Response::Write(text.into());
        self
    }

    /// Consume the matching line without answering. This is the default.
    pub fn skip_write(mut self) -> Self {
        self.response = Response::Skip;
        self
    }

    /// Fail the story if this step is still waiting after `timeout`.
    /// A zero duration disables the limit.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn step_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs the matcher against `line`; on a match returns the response.
    pub fn evaluate(&mut self, line: &str) -> Option<Response> {
        self.matcher.matches(line).then(|| self.response.clone())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.matcher, f)
    }
}
