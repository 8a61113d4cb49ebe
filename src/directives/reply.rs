//! [`Reply`] directive — what to answer once the previous step matched.
//!
//! Script syntax: `reply "Henrique"` (an empty `reply ""` sends a bare newline)

use crate::directive::Directive;
use crate::parser::parse_quoted_string;
use crate::step::Response;
use crate::story::QueueStory;
use anyhow::{Result, anyhow};

/// Sets the response of the most recently added step.
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub const NAME: &'static str = "reply";
}

impl Directive for Reply {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn parse(args: &str) -> Result<Self> {
        Ok(Self {
            text: parse_quoted_string(args)?,
        })
    }

    fn apply(&self, story: &mut QueueStory) -> Result<()> {
        let step = story
            .last_step_mut()
            .ok_or_else(|| anyhow!("'reply' must follow an 'expect' or 'match'"))?;
        if step.response != Response::Skip {
            return Err(anyhow!("Step {step} already has a reply"));
        }
        step.response = Response::Write(self.text.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Step;

    #[test]
    fn test_reply_sets_last_step() {
        let mut story = QueueStory::new();
        story.add([Step::expect("Starting"), Step::expect("Your name:")]);
        Reply::parse(r#""Henrique""#)
            .unwrap()
            .apply(&mut story)
            .unwrap();

        let responses: Vec<_> = story.steps().map(|s| s.response().clone()).collect();
        assert_eq!(
            responses,
            vec![Response::Skip, Response::Write("Henrique".to_string())]
        );
    }

    #[test]
    fn test_reply_without_step() {
        let mut story = QueueStory::new();
        let cmd = Reply::parse(r#""x""#).unwrap();
        assert!(cmd.apply(&mut story).is_err());
    }

    #[test]
    fn test_second_reply_rejected() {
        let mut story = QueueStory::new();
        story.push(Step::expect("a").reply("1"));
        assert!(Reply::parse(r#""2""#).unwrap().apply(&mut story).is_err());
    }
}
