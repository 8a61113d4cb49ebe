use anyhow::{Context, Result, bail};
use clap::Parser;
use ptystory::parser::parse_duration;
use ptystory::{CommandSpec, Terminal, TerminalConfig, parse_file};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "ptystory",
    about = "Run a story script against an interactive terminal program",
    version
)]
struct Args {
    /// Path to the story script
    #[arg(short, long)]
    script: String,

    /// Command to run in the PTY
    #[arg(short, long)]
    command: String,

    /// Overall timeout, overriding the script's `timeout` (e.g. 5s, 750ms)
    #[arg(short, long, value_parser = duration_arg)]
    timeout: Option<Duration>,

    /// Delay between polls for new output
    #[arg(long, value_parser = duration_arg, default_value = "10ms")]
    poll_interval: Duration,

    /// Do not mirror the program's output to stdout
    #[arg(short, long)]
    quiet: bool,

    /// Log lifecycle events to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Arguments to pass to the command
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|err| format!("{err:#}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let directives = parse_file(&args.script)
        .with_context(|| format!("Failed to parse script file: {}", args.script))?;
    let mut story = ptystory::build_story(&directives)
        .with_context(|| format!("Invalid story in {}", args.script))?;
    if args.timeout.is_some() {
        story.set_timeout(args.timeout);
    }

    let mut term = Terminal::new(CommandSpec::new(&args.command).args(&args.args)).config(
        TerminalConfig {
            poll_interval: args.poll_interval,
        },
    );
    if !args.quiet {
        term = term.echo(std::io::stdout());
    }

    term.run(&mut story)
        .await
        .context("Failed to run story")?;

    if !story.success() {
        let remaining: Vec<String> = story.steps().map(ToString::to_string).collect();
        bail!("Story ended with unmatched steps: {}", remaining.join(", "));
    }

    let status = term.wait().await.context("Failed to wait for program")?;
    if !status.success() {
        bail!("Program exited with code {}", status.exit_code());
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ptystory=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
