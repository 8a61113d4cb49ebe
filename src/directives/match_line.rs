//! [`MatchLine`] directive — a step waiting for a line a regular expression
//! matches.
//!
//! Script syntax: `match "p([a-z]+)ch"` or `match "^\\d+$" 2s`

use crate::directive::Directive;
use crate::parser::split_quoted;
use crate::step::Step;
use crate::story::QueueStory;
use anyhow::{Context as _, Result};
use regex::Regex;
use std::time::Duration;

/// Adds a step matching any line the pattern finds a match in.
pub struct MatchLine {
    pub pattern: Regex,
    pub timeout: Option<Duration>,
}

impl MatchLine {
    pub const NAME: &'static str = "match";
}

impl Directive for MatchLine {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        let (pattern, timeout) = split_quoted(args, Self::NAME)?;
        let pattern =
            Regex::new(&pattern).with_context(|| format!("Invalid pattern: {pattern}"))?;
        Ok(Self { pattern, timeout })
    }

    fn apply(&self, story: &mut QueueStory) -> Result<()> {
        let mut step = Step::regex(self.pattern.clone());
        if let Some(timeout) = self.timeout {
            step = step.timeout(timeout);
        }
        story.push(step);
        Ok(())
    }
}
