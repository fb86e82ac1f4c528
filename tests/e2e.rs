mod common;

use common::{notification, pre_tool_use_bash, run_cli};
use mockito::Matcher;
use serde_json::json;
use std::fs;

#[test]
fn webhook_delivery() {
    let mut server = mockito::Server::new();
    let hook = server
        .mock("POST", "/api/webhooks/1/token")
        .match_query(Matcher::UrlEncoded("wait".into(), "true".into()))
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({
            "embeds": [{"title": "🔧 Running Bash", "color": 0x3498DB}],
            "allowed_mentions": {"parse": []}
        })))
        .with_status(200)
        .with_body(r#"{"id": "1"}"#)
        .create();
    let webhook = format!("{}/api/webhooks/1/token", server.url());

    let home = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = run_cli(
        home.path(),
        &[],
        &[("DISCORD_WEBHOOK_URL", webhook.as_str())],
        &pre_tool_use_bash("cargo build"),
    );

    hook.assert();
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
}

#[test]
fn bot_thread_is_created_once_per_session() {
    let mut server = mockito::Server::new();
    let create = server
        .mock("POST", "/channels/100/threads")
        .match_header("authorization", "Bot secret")
        .with_status(201)
        .with_body(r#"{"id": "900"}"#)
        .expect(1)
        .create();
    let lookup = server
        .mock("GET", "/channels/900")
        .with_status(200)
        .with_body(r#"{"id": "900", "thread_metadata": {"archived": false, "locked": false}}"#)
        .expect(1)
        .create();
    let post = server
        .mock("POST", "/channels/900/messages")
        .with_status(200)
        .with_body(r#"{"id": "m"}"#)
        .expect(2)
        .create();

    let api = server.url();
    let home = tempfile::tempdir().unwrap();
    let state = home.path().join("state");
    let env = [
        ("DISCORD_BOT_TOKEN", "secret"),
        ("DISCORD_CHANNEL_ID", "100"),
        ("DISCORD_USE_THREADS", "yes"),
        ("DISCORD_API_BASE", api.as_str()),
        ("DISCORD_STATE_DIR", state.to_str().unwrap()),
    ];

    for command in ["ls", "pwd"] {
        let (code, _, _) = run_cli(home.path(), &[], &env, &pre_tool_use_bash(command));
        assert_eq!(code, 0);
    }

    create.assert();
    lookup.assert();
    post.assert();

    let store: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(state.join("discord_threads.json")).unwrap()).unwrap();
    assert_eq!(store["test-session"]["100"]["thread_id"], "900");
}

#[test]
fn debug_mode_logs_to_files_only() {
    let home = tempfile::tempdir().unwrap();
    let state = home.path().join("state");
    let (code, stdout, stderr) = run_cli(
        home.path(),
        &[],
        &[
            ("DISCORD_DEBUG", "1"),
            ("DISCORD_STATE_DIR", state.to_str().unwrap()),
        ],
        &notification("hello"),
    );
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());

    let logs: Vec<_> = fs::read_dir(state.join("logs")).unwrap().collect();
    assert_eq!(logs.len(), 1);
    let log = fs::read_to_string(logs[0].as_ref().unwrap().path()).unwrap();
    assert!(log.contains("no-credentials"), "{log}");

    let dumps = fs::read_dir(state.join("debug")).unwrap().count();
    assert_eq!(dumps, 2);
}

#[test]
fn no_files_written_without_debug() {
    let home = tempfile::tempdir().unwrap();
    let state = home.path().join("state");
    let (code, _, _) = run_cli(
        home.path(),
        &["--dry-run"],
        &[("DISCORD_STATE_DIR", state.to_str().unwrap())],
        &notification("hello"),
    );
    assert_eq!(code, 0);
    assert!(!state.exists());
}
