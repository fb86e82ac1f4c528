mod common;

use common::{dry_run, notification, pre_tool_use_bash, run_cli};
use std::fs;

#[test]
fn notification_mentions_configured_user() {
    let home = tempfile::tempdir().unwrap();
    let msg = dry_run(
        home.path(),
        &[("DISCORD_MENTION_USER_ID", "42")],
        &notification("Build finished"),
    );
    let content = msg["content"].as_str().unwrap();
    assert!(content.starts_with("<@42>"));
    assert!(content.contains("Build finished"));
    assert_eq!(msg["allowed_mentions"]["users"][0], "42");
    assert_eq!(msg["allowed_mentions"]["parse"].as_array().unwrap().len(), 0);
    assert_eq!(msg["embeds"][0]["color"], 0xE67E22);
    assert!(msg["embeds"][0]["title"].as_str().unwrap().contains("📢"));
}

#[test]
fn pre_tool_use_bash_embed() {
    let home = tempfile::tempdir().unwrap();
    let msg = dry_run(home.path(), &[], &pre_tool_use_bash("echo hi"));
    let embed = &msg["embeds"][0];
    assert_eq!(embed["color"], 0x3498DB);
    assert!(embed["description"].as_str().unwrap().contains("echo hi"));
    assert!(embed["timestamp"].is_string());
    assert!(msg.get("content").is_none());
}

#[test]
fn long_message_is_truncated() {
    let home = tempfile::tempdir().unwrap();
    let msg = dry_run(home.path(), &[], &notification(&"m".repeat(5000)));
    let desc = msg["embeds"][0]["description"].as_str().unwrap();
    assert_eq!(desc.chars().count(), 4096);
    assert!(desc.ends_with('…'));
}

#[test]
fn filtered_event_prints_nothing() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_cli(
        home.path(),
        &["--dry-run"],
        &[("DISCORD_EVENT_PRE_TOOL_USE", "false")],
        &pre_tool_use_bash("ls"),
    );
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
}

#[test]
fn env_file_flag_is_read() {
    let home = tempfile::tempdir().unwrap();
    let env_file = home.path().join("custom.env");
    fs::write(&env_file, "DISCORD_TOOL_BASH=off\n").unwrap();
    let (code, stdout, _) = run_cli(
        home.path(),
        &["--dry-run", "--env-file", env_file.to_str().unwrap()],
        &[],
        &pre_tool_use_bash("ls"),
    );
    assert_eq!(code, 0);
    assert!(stdout.is_empty(), "Bash should be disabled: {stdout}");
}

#[test]
fn env_file_from_environment_variable() {
    let home = tempfile::tempdir().unwrap();
    let env_file = home.path().join("custom.env");
    fs::write(&env_file, "DISCORD_MENTION_USER_ID=7\n").unwrap();
    let msg = dry_run(
        home.path(),
        &[("CLAUDE_DISCORD_ENV_FILE", env_file.to_str().unwrap())],
        &notification("hi"),
    );
    assert_eq!(msg["content"], "<@7> hi");
}

#[test]
fn default_env_file_under_home() {
    let home = tempfile::tempdir().unwrap();
    let hooks = home.path().join(".claude").join("hooks");
    fs::create_dir_all(&hooks).unwrap();
    fs::write(hooks.join(".env.discord"), "DISCORD_MENTION_USER_ID=\"99\"\n").unwrap();
    let msg = dry_run(home.path(), &[], &notification("hi"));
    assert_eq!(msg["content"], "<@99> hi");
}

#[test]
fn process_env_beats_env_file() {
    let home = tempfile::tempdir().unwrap();
    let env_file = home.path().join("custom.env");
    fs::write(&env_file, "DISCORD_MENTION_USER_ID=1\n").unwrap();
    let msg = dry_run(
        home.path(),
        &[
            ("CLAUDE_DISCORD_ENV_FILE", env_file.to_str().unwrap()),
            ("DISCORD_MENTION_USER_ID", "2"),
        ],
        &notification("hi"),
    );
    assert_eq!(msg["content"], "<@2> hi");
}

#[test]
fn help_and_version_exit_zero() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, _) = run_cli(home.path(), &["--help"], &[], "");
    assert_eq!(code, 0);
    assert!(stdout.contains("--dry-run"));

    let (code, stdout, _) = run_cli(home.path(), &["--version"], &[], "");
    assert_eq!(code, 0);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_arguments_are_ignored() {
    let home = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_cli(home.path(), &["--bogus"], &[], &notification("hi"));
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
}
