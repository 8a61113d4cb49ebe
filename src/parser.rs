//! Story scripts: one directive per line, `#` starts a comment.
//!
//! [`parse_str`] and [`parse_file`] turn a script into directives;
//! [`build_story`] folds them into a [`QueueStory`]; [`parse_story`] does both.

use crate::directive::Directive;
use crate::directives::{Expect, MatchLine, Reply, Timeout};
use crate::story::QueueStory;
use anyhow::{Context as _, Result, anyhow, bail, ensure};
use std::path::Path;
use std::time::Duration;

/// Parse every directive in `script`.
///
/// Blank lines and comments are skipped. A `#` inside a quoted string is
/// text, not a comment.
///
/// # Errors
///
/// Fails on the first line naming an unknown directive or carrying bad
/// arguments; the error says which line.
///
/// # Example
///
/// ```
/// use ptystory::parse_str;
///
/// let directives = parse_str("timeout 5s\nexpect \"Your name:\"\nreply \"Henrique\"\n").unwrap();
/// assert_eq!(directives.len(), 3);
/// ```
pub fn parse_str(script: &str) -> Result<Vec<Box<dyn Directive>>> {
    script
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let line = without_comment(raw.trim());
            (!line.is_empty()).then_some((idx + 1, line))
        })
        .map(|(number, line)| {
            parse_directive(line).with_context(|| format!("line {number}: {line}"))
        })
        .collect()
}

/// Read `path` and parse it with [`parse_str`].
pub fn parse_file(path: impl AsRef<Path>) -> Result<Vec<Box<dyn Directive>>> {
    let path = path.as_ref();
    let script = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    parse_str(&script)
}

/// Fold parsed directives, in order, into a fresh [`QueueStory`].
pub fn build_story(directives: &[Box<dyn Directive>]) -> Result<QueueStory> {
    let mut story = QueueStory::new();
    for (idx, directive) in directives.iter().enumerate() {
        directive
            .apply(&mut story)
            .with_context(|| format!("Directive {} ('{}') failed", idx + 1, directive.name()))?;
    }
    Ok(story)
}

/// Parse a script and build the story it describes.
///
/// ```
/// use ptystory::parse_story;
///
/// let story = parse_story(r#"
/// timeout 5s
/// expect "Starting"
/// expect "Your name:"
/// reply "Henrique"
/// "#).unwrap();
/// assert_eq!(story.pending(), 2);
/// ```
pub fn parse_story(content: &str) -> Result<QueueStory> {
    build_story(&parse_str(content)?)
}

type ParseFn = fn(&str) -> Result<Box<dyn Directive>>;

fn parse_directive(line: &str) -> Result<Box<dyn Directive>> {
    let (name, args) = match line.find(char::is_whitespace) {
        Some(at) => line.split_at(at),
        None => (line, ""),
    };
    let parse: ParseFn = match name {
        Timeout::NAME => Timeout::parse_boxed,
        Expect::NAME => Expect::parse_boxed,
        MatchLine::NAME => MatchLine::parse_boxed,
        Reply::NAME => Reply::parse_boxed,
        _ => bail!("Unknown directive '{name}'"),
    };
    parse(args.trim())
}

/// `line` up to the first `#` outside a quoted string.
fn without_comment(line: &str) -> &str {
    let mut rest = line;
    while let Some(at) = rest.find(['#', '"']) {
        if rest[at..].starts_with('#') {
            let cut = line.len() - rest.len() + at;
            return line[..cut].trim_end();
        }
        match scan_quoted(&rest[at..]) {
            Ok((_, after)) => rest = after,
            // Unclosed: the directive reports it.
            Err(_) => break,
        }
    }
    line
}

/// Read one double-quoted string off the front of `input`, returning its
/// text and whatever follows the closing quote.
///
/// `\n`, `\t`, `\"` and `\\` are unescaped; any other backslash is kept
/// as written so patterns like `\d` survive.
fn scan_quoted(input: &str) -> Result<(String, &str)> {
    let body = input
        .strip_prefix('"')
        .ok_or_else(|| anyhow!("expected a double-quoted string, got: {input}"))?;

    let mut text = String::with_capacity(body.len());
    let mut chars = body.char_indices();
    while let Some((at, ch)) = chars.next() {
        match ch {
            '"' => return Ok((text, &body[at + 1..])),
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, escaped @ ('"' | '\\'))) => text.push(escaped),
                Some((_, other)) => {
                    text.push('\\');
                    text.push(other);
                }
                None => break,
            },
            _ => text.push(ch),
        }
    }
    bail!("missing closing quote: {input}")
}

/// Split `"quoted text" [duration]` into the unescaped text and the optional
/// duration after it.
pub(crate) fn split_quoted(args: &str, keyword: &str) -> Result<(String, Option<Duration>)> {
    let args = args.trim();
    ensure!(
        args.starts_with('"'),
        "'{keyword}' takes a double-quoted string"
    );
    let (text, rest) = scan_quoted(args)?;
    let rest = rest.trim();
    let timeout = if rest.is_empty() {
        None
    } else {
        Some(parse_duration(rest)?)
    };
    Ok((text, timeout))
}

/// A whole double-quoted string and nothing after it.
pub(crate) fn parse_quoted_string(s: &str) -> Result<String> {
    let (text, rest) = scan_quoted(s.trim())?;
    ensure!(rest.trim().is_empty(), "unexpected text after the quote: {rest}");
    Ok(text)
}

/// Durations are a number and a unit: `750ms`, `2s`, `1.5s`.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let unit_at = s
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| anyhow!("duration '{s}' has no unit (use s or ms)"))?;
    let (value, unit) = s.split_at(unit_at);
    let value = value.trim();
    match unit {
        "ms" => value
            .parse()
            .map(Duration::from_millis)
            .with_context(|| format!("bad millisecond count '{value}'")),
        "s" => value
            .parse()
            .ok()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| anyhow!("bad second count '{value}'")),
        _ => bail!("unknown duration unit '{unit}' in '{s}' (use s or ms)"),
    }
}
