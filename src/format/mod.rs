pub mod tools;

use crate::dispatch::{EventKind, HookEvent};
use crate::message::{truncate, DiscordMessage, Embed, DESCRIPTION_LIMIT, FIELD_VALUE_LIMIT};
use crate::transcript::TranscriptSummary;
use crate::types::{NotificationInput, PostToolUseInput, PreToolUseInput, StopInput, SubagentStopInput};
use std::path::Path;
use thiserror::Error;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A formatter hit a payload shape it can't render; the caller falls back
/// to generic rendering.
#[derive(Debug, Error)]
pub enum FormattingError {
    #[error("{tool} input doesn't match its expected shape: {source}")]
    ToolInput {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Inputs to formatting that don't come from the hook payload itself.
#[derive(Debug, Clone, Default)]
pub struct FormatContext {
    pub mention_user_id: Option<String>,
    pub summary: Option<TranscriptSummary>,
}

// ===================================================================
// Palette
// ===================================================================

pub fn color(kind: EventKind) -> u32 {
    match kind {
        EventKind::PreToolUse => 0x3498DB,
        EventKind::PostToolUse => 0x2ECC71,
        EventKind::Notification => 0xE67E22,
        EventKind::Stop => 0x95A5A6,
        EventKind::SubagentStop => 0x9B59B6,
        EventKind::Unknown => 0x607D8B,
    }
}

pub fn icon(kind: EventKind) -> &'static str {
    match kind {
        EventKind::PreToolUse => "🔧",
        EventKind::PostToolUse => "✅",
        EventKind::Notification => "📢",
        EventKind::Stop => "🏁",
        EventKind::SubagentStop => "🤖",
        EventKind::Unknown => "❔",
    }
}

// ===================================================================
// Text helpers
// ===================================================================

/// Drop control characters other than newline and tab.
pub fn clean(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Wrap text in a fenced code block whose total length is at most `limit`.
pub(crate) fn code_block(text: &str, lang: &str, limit: usize) -> String {
    let body = text.trim_end_matches(['\n', '\r']).replace("```", "`\u{200b}``");
    let overhead = "```".len() * 2 + lang.chars().count() + 2;
    let body = truncate(&body, limit.saturating_sub(overhead));
    format!("```{lang}\n{body}\n```")
}

pub(crate) fn inline_code(text: &str) -> String {
    format!("`{}`", text.replace('`', "'"))
}

/// Pretty-printed JSON in a code block.
pub(crate) fn json_preview(value: &serde_json::Value, limit: usize) -> String {
    let pretty = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    code_block(&pretty, "json", limit)
}

/// Last path component, or the whole path if there isn't one.
pub(crate) fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

pub(crate) fn short_id(session_id: &str) -> &str {
    match session_id.char_indices().nth(8) {
        Some((i, _)) => &session_id[..i],
        None => session_id,
    }
}

fn format_duration(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "unknown".to_string();
    }
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }
    let total = seconds.round() as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{h}h {m:02}m {s:02}s")
    } else {
        format!("{m}m {s:02}s")
    }
}

fn footer(session_id: &str) -> String {
    format!("Session: {} • discord-notifier v{VERSION}", clean(session_id))
}

/// Base embed shared by every event: title, color, project, footer.
fn base_embed(kind: EventKind, title: &str, session_id: &str, cwd: Option<&str>) -> Embed {
    let embed = Embed::new(&clean(&format!("{} {title}", icon(kind))), color(kind)).footer(&footer(session_id));
    match cwd {
        Some(dir) => embed.field("Project", &clean(&file_name(dir)), true),
        None => embed,
    }
}

/// `<@id> text`, or just the message when no mention is configured.
fn with_mention(message: DiscordMessage, ctx: &FormatContext, text: &str) -> DiscordMessage {
    match ctx.mention_user_id.as_deref() {
        Some(id) => message
            .with_content(&format!("<@{id}> {}", clean(text)))
            .mentioning(id),
        None => message,
    }
}

// ===================================================================
// Formatters
// ===================================================================

/// Render a hook event as a Discord message. Pure.
pub fn format_event(event: &HookEvent, ctx: &FormatContext) -> DiscordMessage {
    match event {
        HookEvent::PreToolUse(e) => format_pre_tool_use(e),
        HookEvent::PostToolUse(e) => format_post_tool_use(e),
        HookEvent::Notification(e) => format_notification(e, ctx),
        HookEvent::Stop(e) => format_stop(e, ctx),
        HookEvent::SubagentStop(e) => format_subagent_stop(e, ctx),
        HookEvent::Unknown {
            event_name,
            session_id,
            raw,
        } => format_unknown(event_name, session_id, raw),
    }
}

fn format_pre_tool_use(e: &PreToolUseInput) -> DiscordMessage {
    let detail = tools::describe(&e.tool_name, &e.tool_input);
    let mut embed = base_embed(
        EventKind::PreToolUse,
        &format!("Running {}", e.tool_name),
        &e.common.session_id,
        e.common.cwd.as_deref(),
    )
    .description(&clean(&detail.summary))
    .field("Tool", &clean(&e.tool_name), true);
    embed.fields.extend(detail.fields);
    DiscordMessage::new(embed)
}

fn format_post_tool_use(e: &PostToolUseInput) -> DiscordMessage {
    let detail = tools::describe(&e.tool_name, &e.tool_input);
    let response = tools::describe_response(&e.tool_name, &e.tool_response);
    let status = if response.failed { "❌ Failed" } else { "✔️ Succeeded" };

    let mut embed = base_embed(
        EventKind::PostToolUse,
        &format!("Finished {}", e.tool_name),
        &e.common.session_id,
        e.common.cwd.as_deref(),
    )
    .description(&clean(&detail.summary))
    .field("Tool", &clean(&e.tool_name), true)
    .field("Status", status, true);
    if let Some(ms) = e.duration_ms {
        embed = embed.field("Duration", &format_duration(ms as f64 / 1000.0), true);
    }
    embed.fields.extend(detail.fields);
    embed.fields.extend(response.fields);
    DiscordMessage::new(embed)
}

fn format_notification(e: &NotificationInput, ctx: &FormatContext) -> DiscordMessage {
    let title = e.title.as_deref().unwrap_or("Notification");
    let mut embed = base_embed(
        EventKind::Notification,
        title,
        &e.common.session_id,
        e.common.cwd.as_deref(),
    )
    .description(&clean(&e.message));
    if let Some(kind) = e.notification_type.as_deref() {
        embed = embed.field("Type", &clean(kind), true);
    }
    with_mention(DiscordMessage::new(embed), ctx, &e.message)
}

/// Activity fields from a transcript summary, if there is one.
fn summary_fields(mut embed: Embed, summary: Option<&TranscriptSummary>, with_count: bool) -> Embed {
    if let Some(s) = summary {
        if let Some(activity) = s.activity.as_deref() {
            embed = embed.field("Activity", activity, false);
        }
        if with_count && s.tool_uses > 0 {
            embed = embed.field("Tool calls", &s.tool_uses.to_string(), true);
        }
    }
    embed
}

fn format_stop(e: &StopInput, ctx: &FormatContext) -> DiscordMessage {
    let session_id = &e.common.session_id;
    let summary = ctx.summary.as_ref();
    let description = summary
        .and_then(|s| s.last_response.as_deref())
        .unwrap_or("Claude has finished responding.");

    let mut embed = base_embed(EventKind::Stop, "Session finished", session_id, e.common.cwd.as_deref())
        .description(&clean(description));
    if let Some(secs) = e.duration_seconds {
        embed = embed.field("Duration", &format_duration(secs), true);
    }
    embed = summary_fields(embed, summary, true);

    let text = format!("Claude Code session {} finished", short_id(session_id));
    with_mention(DiscordMessage::new(embed), ctx, &text)
}

fn format_subagent_stop(e: &SubagentStopInput, ctx: &FormatContext) -> DiscordMessage {
    let summary = ctx.summary.as_ref();
    let title = match e.agent_type.as_deref() {
        Some(agent) => format!("Subagent finished: {agent}"),
        None => "Subagent finished".to_string(),
    };
    let description = e
        .result
        .as_deref()
        .or_else(|| summary.and_then(|s| s.last_response.as_deref()))
        .unwrap_or("A subagent has finished its task.");

    let mut embed = base_embed(
        EventKind::SubagentStop,
        &title,
        &e.common.session_id,
        e.common.cwd.as_deref(),
    )
    .description(&clean(description));
    if let Some(id) = e.subagent_id.as_deref() {
        embed = embed.field("Subagent", &clean(id), true);
    }
    if let Some(secs) = e.duration_seconds {
        embed = embed.field("Duration", &format_duration(secs), true);
    }
    if let Some(n) = e.tools_used {
        embed = embed.field("Tools used", &n.to_string(), true);
    }
    embed = summary_fields(embed, summary, e.tools_used.is_none());
    DiscordMessage::new(embed)
}

fn format_unknown(event_name: &str, session_id: &str, raw: &serde_json::Value) -> DiscordMessage {
    let cwd = raw.get("cwd").and_then(|v| v.as_str());
    let embed = base_embed(EventKind::Unknown, event_name, session_id, cwd)
        .description(&clean(&json_preview(raw, DESCRIPTION_LIMIT)));
    DiscordMessage::new(embed)
}

/// One-line plain-text rendering, used for forum post titles and logs.
pub fn headline(event: &HookEvent) -> String {
    let text = match event {
        HookEvent::Notification(e) => e.message.clone(),
        other => other.to_string(),
    };
    truncate(&clean(&text).replace('\n', " "), FIELD_VALUE_LIMIT)
}

#[cfg(test)]
mod tests;
