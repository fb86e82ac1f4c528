use super::*;
use crate::dispatch::classify;
use crate::message::{
    Embed, EMBED_TOTAL_LIMIT, FIELD_NAME_LIMIT, FOOTER_LIMIT, MAX_FIELDS, TITLE_LIMIT,
    TRUNCATION_MARKER,
};
use proptest::prelude::*;
use serde_json::json;

fn event(raw: serde_json::Value) -> HookEvent {
    classify(&raw).unwrap()
}

fn embed(msg: &DiscordMessage) -> &Embed {
    msg.embed().expect("message has an embed")
}

fn field<'a>(embed: &'a Embed, name: &str) -> Option<&'a str> {
    embed.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
}

fn mention(id: &str) -> FormatContext {
    FormatContext {
        mention_user_id: Some(id.to_string()),
        ..Default::default()
    }
}

fn assert_within_limits(msg: &DiscordMessage) {
    assert!(msg.embeds.len() <= 1);
    let e = embed(msg);
    assert!(e.title.chars().count() <= TITLE_LIMIT);
    if let Some(d) = &e.description {
        assert!(d.chars().count() <= DESCRIPTION_LIMIT);
    }
    assert!(e.fields.len() <= MAX_FIELDS);
    for f in &e.fields {
        assert!(f.name.chars().count() <= FIELD_NAME_LIMIT);
        assert!(f.value.chars().count() <= FIELD_VALUE_LIMIT);
    }
    if let Some(f) = &e.footer {
        assert!(f.text.chars().count() <= FOOTER_LIMIT);
    }
    assert!(e.text_len() <= EMBED_TOTAL_LIMIT);
    if let Some(c) = &msg.content {
        assert!(c.chars().count() <= crate::message::CONTENT_LIMIT);
    }
}

// =================================================================
// End-to-end scenarios
// =================================================================

#[test]
fn notification_with_mention() {
    let ev = event(json!({
        "hook_event_name": "Notification",
        "session_id": "abc123",
        "message": "Build finished"
    }));
    let msg = format_event(&ev, &mention("42"));

    assert_eq!(msg.content.as_deref(), Some("<@42> Build finished"));
    assert_eq!(msg.allowed_mentions.users, vec!["42".to_string()]);
    assert!(msg.allowed_mentions.parse.is_empty());
    let e = embed(&msg);
    assert_eq!(e.title, "📢 Notification");
    assert_eq!(e.color, color(EventKind::Notification));
    assert_eq!(e.description.as_deref(), Some("Build finished"));
}

#[test]
fn notification_without_mention_has_no_content() {
    let ev = event(json!({
        "hook_event_name": "Notification",
        "session_id": "abc123",
        "message": "Claude needs your permission to use Bash",
        "title": "Permission needed",
        "notification_type": "permission_prompt"
    }));
    let msg = format_event(&ev, &FormatContext::default());
    assert_eq!(msg.content, None);
    assert!(msg.allowed_mentions.users.is_empty());
    let e = embed(&msg);
    assert_eq!(e.title, "📢 Permission needed");
    assert_eq!(field(e, "Type"), Some("permission_prompt"));
}

#[test]
fn pre_tool_use_bash() {
    let ev = event(json!({
        "hook_event_name": "PreToolUse",
        "session_id": "abc123",
        "tool_name": "Bash",
        "tool_input": {"command": "echo hi"}
    }));
    let msg = format_event(&ev, &FormatContext::default());
    let e = embed(&msg);
    assert_eq!(e.color, 0x3498DB);
    assert_eq!(e.title, "🔧 Running Bash");
    assert!(e.description.as_deref().unwrap().contains("echo hi"));
    assert_eq!(field(e, "Tool"), Some("Bash"));
    assert_eq!(msg.content, None);
}

#[test]
fn long_notification_is_truncated_to_description_limit() {
    let ev = event(json!({
        "hook_event_name": "Notification",
        "session_id": "abc123",
        "message": "m".repeat(5000)
    }));
    let msg = format_event(&ev, &FormatContext::default());
    let desc = embed(&msg).description.as_deref().unwrap();
    assert_eq!(desc.chars().count(), 4096);
    assert!(desc.ends_with(TRUNCATION_MARKER));
}

// =================================================================
// Per-event rendering
// =================================================================

#[test]
fn post_tool_use_reports_status_duration_and_output() {
    let ev = event(json!({
        "hook_event_name": "PostToolUse",
        "session_id": "abc123",
        "cwd": "/home/me/project",
        "tool_name": "Bash",
        "tool_input": {"command": "cargo test"},
        "tool_response": {"stdout": "test result: ok", "stderr": "", "interrupted": false},
        "duration_ms": 2500
    }));
    let msg = format_event(&ev, &FormatContext::default());
    let e = embed(&msg);
    assert_eq!(e.color, 0x2ECC71);
    assert_eq!(e.title, "✅ Finished Bash");
    assert_eq!(field(e, "Status"), Some("✔️ Succeeded"));
    assert_eq!(field(e, "Duration"), Some("2.5s"));
    assert_eq!(field(e, "Project"), Some("project"));
    assert!(field(e, "Output").unwrap().contains("test result: ok"));
}

#[test]
fn post_tool_use_failure_keeps_palette_color() {
    let ev = event(json!({
        "hook_event_name": "PostToolUse",
        "session_id": "abc123",
        "tool_name": "Write",
        "tool_input": {"file_path": "/x", "content": ""},
        "tool_response": {"error": "permission denied"}
    }));
    let msg = format_event(&ev, &FormatContext::default());
    let e = embed(&msg);
    assert_eq!(e.color, color(EventKind::PostToolUse));
    assert_eq!(field(e, "Status"), Some("❌ Failed"));
    assert!(field(e, "Error").unwrap().contains("permission denied"));
}

#[test]
fn stop_uses_summary_and_mention() {
    let ev = event(json!({
        "hook_event_name": "Stop",
        "session_id": "0123456789abcdef",
        "duration_seconds": 125.0
    }));
    let ctx = FormatContext {
        mention_user_id: Some("7".into()),
        summary: Some(TranscriptSummary {
            tool_uses: 3,
            activity: Some("ran 3 commands".into()),
            last_response: Some("All tests pass.".into()),
        }),
    };
    let msg = format_event(&ev, &ctx);
    assert_eq!(
        msg.content.as_deref(),
        Some("<@7> Claude Code session 01234567 finished")
    );
    let e = embed(&msg);
    assert_eq!(e.color, 0x95A5A6);
    assert_eq!(e.title, "🏁 Session finished");
    assert_eq!(e.description.as_deref(), Some("All tests pass."));
    assert_eq!(field(e, "Duration"), Some("2m 05s"));
    assert_eq!(field(e, "Activity"), Some("ran 3 commands"));
    assert_eq!(field(e, "Tool calls"), Some("3"));
    assert!(e.footer.as_ref().unwrap().text.contains("0123456789abcdef"));
    assert!(e.footer.as_ref().unwrap().text.contains(VERSION));
}

#[test]
fn stop_without_summary_has_default_description() {
    let ev = event(json!({"hook_event_name": "Stop", "session_id": "s"}));
    let msg = format_event(&ev, &FormatContext::default());
    assert_eq!(
        embed(&msg).description.as_deref(),
        Some("Claude has finished responding.")
    );
    assert_eq!(msg.content, None);
}

#[test]
fn subagent_stop_fields() {
    let ev = event(json!({
        "hook_event_name": "SubagentStop",
        "session_id": "s",
        "subagent_id": "agent-1",
        "agent_type": "Explore",
        "result": "Found 3 call sites",
        "duration_seconds": 4.0,
        "tools_used": 6
    }));
    let msg = format_event(&ev, &mention("42"));
    let e = embed(&msg);
    assert_eq!(e.color, 0x9B59B6);
    assert_eq!(e.title, "🤖 Subagent finished: Explore");
    assert_eq!(e.description.as_deref(), Some("Found 3 call sites"));
    assert_eq!(field(e, "Subagent"), Some("agent-1"));
    assert_eq!(field(e, "Duration"), Some("4.0s"));
    assert_eq!(field(e, "Tools used"), Some("6"));
    // Mentions are only for Notification and Stop.
    assert_eq!(msg.content, None);
}

#[test]
fn unknown_event_renders_generic_preview() {
    let ev = event(json!({
        "hook_event_name": "SessionStart",
        "session_id": "s",
        "source": "startup"
    }));
    let msg = format_event(&ev, &FormatContext::default());
    let e = embed(&msg);
    assert_eq!(e.title, "❔ SessionStart");
    assert_eq!(e.color, color(EventKind::Unknown));
    assert!(e.description.as_deref().unwrap().contains("\"source\": \"startup\""));
}

#[test]
fn control_characters_are_stripped() {
    let ev = event(json!({
        "hook_event_name": "Notification",
        "session_id": "s",
        "message": "line1\nline2\u{1b}[31m\u{0007}"
    }));
    let msg = format_event(&ev, &FormatContext::default());
    assert_eq!(embed(&msg).description.as_deref(), Some("line1\nline2[31m"));
}

#[test]
fn every_palette_entry_is_distinct() {
    let kinds = [
        EventKind::PreToolUse,
        EventKind::PostToolUse,
        EventKind::Notification,
        EventKind::Stop,
        EventKind::SubagentStop,
        EventKind::Unknown,
    ];
    for (i, a) in kinds.iter().enumerate() {
        for b in &kinds[i + 1..] {
            assert_ne!(color(*a), color(*b));
            assert_ne!(icon(*a), icon(*b));
        }
    }
}

// =================================================================
// Helpers
// =================================================================

#[test]
fn code_block_respects_limit_and_escapes_fences() {
    let block = code_block(&"x".repeat(100), "bash", 40);
    assert_eq!(block.chars().count(), 40);
    assert!(block.starts_with("```bash\n") && block.ends_with("\n```"));

    let block = code_block("a```b", "", 100);
    assert_eq!(block.matches("```").count(), 2);
}

#[test]
fn durations() {
    assert_eq!(format_duration(0.5), "0.5s");
    assert_eq!(format_duration(61.0), "1m 01s");
    assert_eq!(format_duration(3725.0), "1h 02m 05s");
    assert_eq!(format_duration(f64::NAN), "unknown");
}

#[test]
fn headline_is_single_line() {
    let ev = event(json!({"hook_event_name": "Notification", "session_id": "s", "message": "a\nb"}));
    assert_eq!(headline(&ev), "a b");
    let ev = event(json!({"hook_event_name": "PreToolUse", "session_id": "s", "tool_name": "Read"}));
    assert_eq!(headline(&ev), "PreToolUse(Read)");
}

// =================================================================
// Limits hold for arbitrarily long input
// =================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn every_event_kind_respects_limits(
        text in ".{0,200}",
        repeat in 1usize..60,
        tool in prop_oneof![
            Just("Bash"), Just("Edit"), Just("Write"), Just("Task"),
            Just("TodoWrite"), Just("mcp__x__y"),
        ],
    ) {
        let long = text.repeat(repeat);
        let tool_input = json!({
            "command": long,
            "file_path": long,
            "old_string": long,
            "new_string": long,
            "content": long,
            "prompt": long,
            "description": long,
            "todos": [{"content": long}],
        });
        let raws = vec![
            json!({"hook_event_name": "PreToolUse", "session_id": long, "cwd": long,
                   "tool_name": tool, "tool_input": tool_input}),
            json!({"hook_event_name": "PostToolUse", "session_id": "s", "tool_name": tool,
                   "tool_input": tool_input,
                   "tool_response": {"stdout": long, "stderr": long, "error": long}}),
            json!({"hook_event_name": "Notification", "session_id": "s", "message": long,
                   "title": long, "notification_type": long}),
            json!({"hook_event_name": "Stop", "session_id": long}),
            json!({"hook_event_name": "SubagentStop", "session_id": "s", "result": long,
                   "agent_type": long, "subagent_id": long}),
            json!({"hook_event_name": format!("Custom{long}"), "session_id": "s", "blob": long}),
        ];
        let ctx = FormatContext {
            mention_user_id: Some("42".into()),
            summary: Some(TranscriptSummary {
                tool_uses: 1,
                activity: Some(long.clone()),
                last_response: Some(long.clone()),
            }),
        };
        for raw in raws {
            let ev = classify(&raw).unwrap();
            assert_within_limits(&format_event(&ev, &ctx));
        }
    }
}
