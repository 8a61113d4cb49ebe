//! The [`Directive`] trait every script-file keyword implements.

use crate::story::QueueStory;
use anyhow::Result;

/// A single line of a story script.
///
/// To add a new directive:
///
/// 1. Define `pub const NAME: &'static str` on your struct, the keyword that
///    starts the script line (e.g. `"expect"`, `"reply"`).
/// 2. Re-export the struct from `src/directives/mod.rs`.
/// 3. Add one entry to the `REGISTRY` in [`crate::parser`]:
///    `(MyDirective::NAME, MyDirective::parse_boxed)`.
pub trait Directive: 'static {
    /// The keyword, accessible at runtime through a trait object.
    fn name(&self) -> &'static str;

    /// Parse this directive from everything after the keyword.
    fn parse(args: &str) -> Result<Self>
    where
        Self: Sized;

    /// Parse and box this directive; the function-pointer type stored in the
    /// registry.
    fn parse_boxed(args: &str) -> Result<Box<dyn Directive>>
    where
        Self: Sized,
    {
        Ok(Box::new(Self::parse(args)?))
    }

    /// Fold this directive into the story being built.
    fn apply(&self, story: &mut QueueStory) -> Result<()>;
}
