//! [`Timeout`] directive — the overall deadline of the story.
//!
//! Script syntax: `timeout 5s` or `timeout 750ms`

use crate::directive::Directive;
use crate::parser::parse_duration;
use crate::story::QueueStory;
use anyhow::Result;
use std::time::Duration;

/// Fails the whole story once `duration` has passed since it started.
pub struct Timeout {
    pub duration: Duration,
}

impl Timeout {
    pub const NAME: &'static str = "timeout";
}

impl Directive for Timeout {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        Ok(Self {
            duration: parse_duration(args)?,
        })
    }

    fn apply(&self, story: &mut QueueStory) -> Result<()> {
        story.set_timeout(Some(self.duration));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seconds() {
        assert_eq!(
            Timeout::parse("5s").unwrap().duration,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Timeout::parse("5minutes").is_err());
    }

    #[test]
    fn test_apply_sets_story_timeout() {
        let mut story = QueueStory::new();
        Timeout::parse("100ms")
            .unwrap()
            .apply(&mut story)
            .unwrap();
        assert_eq!(story.timeout(), Some(Duration::from_millis(100)));
    }
}
