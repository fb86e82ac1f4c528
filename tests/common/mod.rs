use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Run the binary with a clean environment whose `HOME` is `home`, so no
/// real `~/.claude/hooks/.env.discord` leaks into the test.
pub fn run_cli(home: &Path, args: &[&str], env: &[(&str, &str)], stdin: &str) -> (i32, String, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_discord-notifier"))
        .args(args)
        .env_clear()
        .env("HOME", home)
        .envs(env.iter().copied())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn binary");

    // The binary may exit before reading everything (e.g. --help).
    let _ = child.stdin.as_mut().unwrap().write_all(stdin.as_bytes());

    let output = child.wait_with_output().unwrap();
    (
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    )
}

/// Run with `--dry-run` and parse the printed message.
pub fn dry_run(home: &Path, env: &[(&str, &str)], stdin: &str) -> serde_json::Value {
    let (code, stdout, stderr) = run_cli(home, &["--dry-run"], env, stdin);
    assert_eq!(code, 0);
    assert!(stderr.is_empty(), "stderr: {stderr}");
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("bad dry-run output {stdout:?}: {e}"))
}

pub fn pre_tool_use_bash(command: &str) -> String {
    serde_json::json!({
        "hook_event_name": "PreToolUse",
        "session_id": "test-session",
        "transcript_path": "/tmp/t.jsonl",
        "cwd": "/tmp/demo",
        "permission_mode": "default",
        "tool_name": "Bash",
        "tool_input": {"command": command}
    })
    .to_string()
}

pub fn notification(message: &str) -> String {
    serde_json::json!({
        "hook_event_name": "Notification",
        "session_id": "test-session",
        "cwd": "/tmp/demo",
        "message": message
    })
    .to_string()
}
