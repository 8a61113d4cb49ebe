#![cfg(unix)]

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const GREETER: &str = r#"echo Starting
printf 'Your name: '
read name
echo "Your name is $name"
printf 'Your age: '
read age
echo "Your age is $age"
echo 'Bye!'"#;

fn script_file(script: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create script file");
    file.write_all(script.as_bytes())
        .expect("Failed to write script file");
    file
}

fn run_story(script: &str, extra: &[&str], program: &str) -> Output {
    let file = script_file(script);
    Command::new(env!("CARGO_BIN_EXE_ptystory"))
        .arg("--script")
        .arg(file.path())
        .args(extra)
        .arg("--command")
        .arg("sh")
        .arg("--")
        .arg("-c")
        .arg(program)
        .output()
        .expect("Failed to execute ptystory")
}

#[test]
fn test_successful_story() {
    let script = r#"
timeout 5s
expect "Starting"      # no reply
expect "Your name:"
reply "Henrique"
match "^Your age:"
reply "10"
"#;

    let output = run_story(script, &[], GREETER);
    assert!(
        output.status.success(),
        "ptystory failed with stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Your name: Henrique"),
        "Output should mirror the session, got: {stdout}"
    );
}

#[test]
fn test_quiet_mode_prints_nothing() {
    let script = "expect \"Starting\"\nexpect \"Your name:\"\nreply \"a\"\nexpect \"Your age:\"\nreply \"1\"\n";
    let output = run_story(script, &["--quiet", "--timeout", "5s"], GREETER);
    assert!(
        output.status.success(),
        "ptystory failed with stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(output.stdout.is_empty());
}

#[test]
fn test_timeout_fails() {
    let script = r#"
timeout 300ms
expect "Starting"
expect "this_will_never_appear"
"#;

    let output = run_story(script, &["--quiet"], "echo Starting; sleep 2");
    assert!(!output.status.success(), "ptystory should fail with timeout");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("timed out"), "got: {stderr}");
}

#[test]
fn test_unknown_directive() {
    let output = run_story("wait 1s\n", &[], "true");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unknown directive"), "got: {stderr}");
}

#[test]
fn test_unmatched_steps_fail_when_program_exits() {
    let script = "timeout 5s\nexpect \"Starting\"\nexpect \"More\"\n";
    let output = run_story(script, &["--quiet"], "echo Starting; sleep 0.2");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unmatched steps"), "got: {stderr}");
    assert!(stderr.contains("\"More\""), "got: {stderr}");
}

#[test]
fn test_failing_program_fails_run() {
    let script = "timeout 5s\nexpect \"Starting\"\nreply \"go\"\n";
    let output = run_story(script, &["--quiet"], "echo Starting; read x; exit 4");
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("exited with code 4"), "got: {stderr}");
}
