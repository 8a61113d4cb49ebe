//! [`Expect`] directive — a step waiting for a literal line.
//!
//! Script syntax:
//! - `expect "Your name:"` — no step timeout
//! - `expect "Password:" 10s` — fail if not seen within 10 seconds

use crate::directive::Directive;
use crate::parser::split_quoted;
use crate::step::Step;
use crate::story::QueueStory;
use anyhow::Result;
use std::time::Duration;

/// Adds a step matching a line equal to `text` once whitespace is trimmed.
pub struct Expect {
    pub text: String,
    pub timeout: Option<Duration>,
}

impl Expect {
    pub const NAME: &'static str = "expect";
}

impl Directive for Expect {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        let (text, timeout) = split_quoted(args, Self::NAME)?;
        Ok(Self { text, timeout })
    }

    fn apply(&self, story: &mut QueueStory) -> Result<()> {
        let mut step = Step::expect(self.text.clone());
        if let Some(timeout) = self.timeout {
            step = step.timeout(timeout);
        }
        story.push(step);
        Ok(())
    }
}
