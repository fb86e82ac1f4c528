//! Per-tool rendering of `tool_input` / `tool_response` for tool embeds.

use super::{clean, code_block, file_name, inline_code, json_preview, FormattingError};
use crate::message::{EmbedField, DESCRIPTION_LIMIT, FIELD_VALUE_LIMIT};
use crate::types::ToolCall;
use serde_json::Value;

/// Description text plus extra fields describing one tool call.
#[derive(Debug, Default)]
pub struct ToolDetail {
    pub summary: String,
    pub fields: Vec<EmbedField>,
}

impl ToolDetail {
    fn new(summary: String) -> Self {
        Self {
            summary,
            fields: Vec::new(),
        }
    }

    fn field(mut self, name: &str, value: impl AsRef<str>, inline: bool) -> Self {
        self.fields.push(EmbedField::new(name, clean(value.as_ref()), inline));
        self
    }

    fn field_opt(self, name: &str, value: Option<impl AsRef<str>>, inline: bool) -> Self {
        match value {
            Some(v) => self.field(name, v, inline),
            None => self,
        }
    }
}

/// Render a tool call. Known tools whose input doesn't match the expected
/// shape fall back to the generic JSON preview.
pub fn describe(tool_name: &str, tool_input: &Value) -> ToolDetail {
    match try_describe(tool_name, tool_input) {
        Ok(detail) => detail,
        Err(e) => {
            tracing::debug!(error = %e, "falling back to generic tool rendering");
            generic(tool_input)
        }
    }
}

fn try_describe(tool_name: &str, tool_input: &Value) -> Result<ToolDetail, FormattingError> {
    let call = ToolCall::parse(tool_name, tool_input).map_err(|source| {
        FormattingError::ToolInput {
            tool: tool_name.to_string(),
            source,
        }
    })?;

    let detail = match call {
        ToolCall::Bash(b) => ToolDetail::new(code_block(&b.command, "bash", DESCRIPTION_LIMIT))
            .field_opt("Description", b.description.as_deref(), false)
            .field_opt("Timeout", b.timeout.map(|ms| format!("{ms} ms")), true)
            .field_opt(
                "Background",
                b.run_in_background.filter(|bg| *bg).map(|_| "yes"),
                true,
            ),
        ToolCall::Write(w) => {
            let lines = w.content.lines().count();
            let chars = w.content.chars().count();
            ToolDetail::new(format!("Writing {}", inline_code(&file_name(&w.file_path))))
                .field("File", &w.file_path, false)
                .field("Size", format!("{lines} lines, {chars} chars"), true)
                .field("Preview", code_block(&w.content, "", FIELD_VALUE_LIMIT), false)
        }
        ToolCall::Edit(e) => {
            ToolDetail::new(format!("Editing {}", inline_code(&file_name(&e.file_path))))
                .field("File", &e.file_path, false)
                .field("Old", code_block(&e.old_string, "", FIELD_VALUE_LIMIT), false)
                .field("New", code_block(&e.new_string, "", FIELD_VALUE_LIMIT), false)
                .field_opt("Replace all", e.replace_all.filter(|r| *r).map(|_| "yes"), true)
        }
        ToolCall::MultiEdit(m) => {
            let count = m.edits.len();
            let mut detail = ToolDetail::new(format!(
                "Applying {count} edit{} to {}",
                if count == 1 { "" } else { "s" },
                inline_code(&file_name(&m.file_path))
            ))
            .field("File", &m.file_path, false);
            if let Some(first) = m.edits.first() {
                detail = detail
                    .field("First edit (old)", code_block(&first.old_string, "", FIELD_VALUE_LIMIT), false)
                    .field("First edit (new)", code_block(&first.new_string, "", FIELD_VALUE_LIMIT), false);
            }
            detail
        }
        ToolCall::NotebookEdit(n) => {
            ToolDetail::new(format!("Editing notebook {}", inline_code(&file_name(&n.notebook_path))))
                .field("Notebook", &n.notebook_path, false)
                .field_opt("Cell", n.cell_id.as_deref(), true)
                .field_opt("Mode", n.edit_mode.as_deref(), true)
        }
        ToolCall::Read(r) => {
            let range = r.offset.map(|offset| {
                let limit = r.limit.unwrap_or(2000);
                format!("lines {offset}-{}", offset.saturating_add(limit))
            });
            ToolDetail::new(format!("Reading {}", inline_code(&file_name(&r.file_path))))
                .field("File", &r.file_path, false)
                .field_opt("Range", range, true)
        }
        ToolCall::Glob(g) => {
            ToolDetail::new(format!("Finding files matching {}", inline_code(&g.pattern)))
                .field_opt("Path", g.path.as_deref(), true)
        }
        ToolCall::Grep(g) => ToolDetail::new(format!("Searching for {}", inline_code(&g.pattern)))
            .field_opt("Path", g.path.as_deref(), true)
            .field_opt("Glob", g.glob.as_deref(), true)
            .field_opt("Mode", g.output_mode.as_deref(), true)
            .field_opt(
                "Case-insensitive",
                g.case_insensitive.filter(|i| *i).map(|_| "yes"),
                true,
            ),
        ToolCall::WebFetch(w) => ToolDetail::new(format!("Fetching {}", w.url))
            .field_opt("Prompt", w.prompt.as_deref(), false),
        ToolCall::WebSearch(w) => {
            ToolDetail::new(format!("Searching the web for {}", inline_code(&w.query)))
                .field_opt("Allowed domains", w.allowed_domains.map(|d| d.join(", ")), false)
                .field_opt("Blocked domains", w.blocked_domains.map(|d| d.join(", ")), false)
        }
        ToolCall::Task(t) => ToolDetail::new(format!("Delegating: {}", t.description))
            .field_opt("Agent type", t.subagent_type.as_deref(), true)
            .field("Prompt", &t.prompt, false),
        ToolCall::TodoWrite(t) => {
            let items: Vec<String> = t
                .todos
                .iter()
                .map(|todo| {
                    let mark = match todo.status.as_deref() {
                        Some("completed") => "☑",
                        Some("in_progress") => "▶",
                        _ => "☐",
                    };
                    format!("{mark} {}", todo.content)
                })
                .collect();
            ToolDetail::new(format!("Updating todo list ({} items)", items.len()))
                .field("Items", items.join("\n"), false)
        }
        ToolCall::Other { tool_input, .. } => generic(&tool_input),
    };
    Ok(detail)
}

/// Raw JSON preview for tools without a dedicated renderer.
fn generic(tool_input: &Value) -> ToolDetail {
    if tool_input.is_null() {
        return ToolDetail::new("(no input)".to_string());
    }
    ToolDetail::new(json_preview(tool_input, DESCRIPTION_LIMIT))
}

// ===================================================================
// Tool responses (PostToolUse)
// ===================================================================

/// Rendered `tool_response`: whether the call failed, and result fields.
#[derive(Debug, Default)]
pub struct ResponseDetail {
    pub failed: bool,
    pub fields: Vec<EmbedField>,
}

fn non_empty_str(v: &Value) -> Option<&str> {
    v.as_str().filter(|s| !s.trim().is_empty())
}

/// Whether a tool response reports failure.
pub fn response_failed(response: &Value) -> bool {
    response["is_error"].as_bool() == Some(true)
        || response["isError"].as_bool() == Some(true)
        || response["success"].as_bool() == Some(false)
        || response["interrupted"].as_bool() == Some(true)
        || non_empty_str(&response["error"]).is_some()
}

pub fn describe_response(tool_name: &str, response: &Value) -> ResponseDetail {
    let failed = response_failed(response);
    let mut fields = Vec::new();
    let mut push = |name: &str, value: String| fields.push(EmbedField::new(name, value, false));

    if let Some(err) = non_empty_str(&response["error"]) {
        push("Error", code_block(&clean(err), "", FIELD_VALUE_LIMIT));
    }

    match (tool_name, response) {
        (_, Value::Null) => {}
        (_, Value::String(s)) => {
            if !s.trim().is_empty() {
                push("Result", code_block(&clean(s), "", FIELD_VALUE_LIMIT));
            }
        }
        ("Bash", _) => {
            if let Some(out) = non_empty_str(&response["stdout"]) {
                push("Output", code_block(&clean(out), "", FIELD_VALUE_LIMIT));
            }
            if let Some(err) = non_empty_str(&response["stderr"]) {
                push("Stderr", code_block(&clean(err), "", FIELD_VALUE_LIMIT));
            }
        }
        ("Write" | "Edit" | "MultiEdit" | "Read" | "NotebookEdit", _) => {
            if let Some(path) = non_empty_str(&response["filePath"]) {
                push("File", clean(path));
            }
        }
        _ => {
            if response.as_object().is_none_or(|o| !o.is_empty()) {
                push("Result", json_preview(response, FIELD_VALUE_LIMIT));
            }
        }
    }

    ResponseDetail { failed, fields }
}
