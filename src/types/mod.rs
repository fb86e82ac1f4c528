use serde::Deserialize;

// ===================================================================
// Hook Input Types (received via stdin, snake_case JSON)
// ===================================================================

/// Fields shared by all hook event inputs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CommonInput {
    pub session_id: String,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

// --- Per-event input structs ---

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PreToolUseInput {
    #[serde(flatten)]
    pub common: CommonInput,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub tool_use_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostToolUseInput {
    #[serde(flatten)]
    pub common: CommonInput,
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
    #[serde(default)]
    pub tool_response: serde_json::Value,
    #[serde(default)]
    pub tool_use_id: Option<String>,
    /// Wall-clock duration of the tool call, when the host reports it.
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationInput {
    #[serde(flatten)]
    pub common: CommonInput,
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
    /// Expected values: "permission_prompt", "idle_prompt", "auth_success",
    /// "elicitation_dialog". Kept as a string so new values don't fail parsing.
    #[serde(default)]
    pub notification_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StopInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub stop_hook_active: Option<bool>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubagentStopInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub stop_hook_active: Option<bool>,
    #[serde(default, alias = "agent_id")]
    pub subagent_id: Option<String>,
    #[serde(default)]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub agent_transcript_path: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub tools_used: Option<u64>,
}

// ===================================================================
// Tool-Specific Input Types
// ===================================================================

/// Parsed tool call, matching `tool_name` to a typed `tool_input`.
#[derive(Debug)]
pub enum ToolCall {
    Bash(BashToolInput),
    Write(WriteToolInput),
    Edit(EditToolInput),
    MultiEdit(MultiEditToolInput),
    NotebookEdit(NotebookEditToolInput),
    Read(ReadToolInput),
    Glob(GlobToolInput),
    Grep(GrepToolInput),
    WebFetch(WebFetchToolInput),
    WebSearch(WebSearchToolInput),
    Task(TaskToolInput),
    TodoWrite(TodoWriteToolInput),
    /// MCP or other unknown tools; keeps the raw JSON.
    Other {
        tool_name: String,
        tool_input: serde_json::Value,
    },
}

impl ToolCall {
    /// Parse `tool_name` + `tool_input` into a typed `ToolCall`.
    ///
    /// Fails only when a known tool's input doesn't match its expected shape.
    pub fn parse(
        tool_name: &str,
        tool_input: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let input = || tool_input.clone();
        match tool_name {
            "Bash" => Ok(Self::Bash(serde_json::from_value(input())?)),
            "Write" => Ok(Self::Write(serde_json::from_value(input())?)),
            "Edit" => Ok(Self::Edit(serde_json::from_value(input())?)),
            "MultiEdit" => Ok(Self::MultiEdit(serde_json::from_value(input())?)),
            "NotebookEdit" => Ok(Self::NotebookEdit(serde_json::from_value(input())?)),
            "Read" => Ok(Self::Read(serde_json::from_value(input())?)),
            "Glob" => Ok(Self::Glob(serde_json::from_value(input())?)),
            "Grep" => Ok(Self::Grep(serde_json::from_value(input())?)),
            "WebFetch" => Ok(Self::WebFetch(serde_json::from_value(input())?)),
            "WebSearch" => Ok(Self::WebSearch(serde_json::from_value(input())?)),
            "Task" => Ok(Self::Task(serde_json::from_value(input())?)),
            "TodoWrite" => Ok(Self::TodoWrite(serde_json::from_value(input())?)),
            other => Ok(Self::Other {
                tool_name: other.to_string(),
                tool_input: input(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BashToolInput {
    pub command: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub run_in_background: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WriteToolInput {
    pub file_path: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditToolInput {
    pub file_path: String,
    pub old_string: String,
    pub new_string: String,
    #[serde(default)]
    pub replace_all: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MultiEditToolInput {
    pub file_path: String,
    pub edits: Vec<EditOperation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditOperation {
    pub old_string: String,
    pub new_string: String,
    #[serde(default)]
    pub replace_all: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotebookEditToolInput {
    pub notebook_path: String,
    #[serde(default)]
    pub cell_id: Option<String>,
    #[serde(default)]
    pub edit_mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadToolInput {
    pub file_path: String,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobToolInput {
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrepToolInput {
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub glob: Option<String>,
    #[serde(default)]
    pub output_mode: Option<String>,
    #[serde(default, rename = "-i")]
    pub case_insensitive: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebFetchToolInput {
    pub url: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchToolInput {
    pub query: String,
    #[serde(default)]
    pub allowed_domains: Option<Vec<String>>,
    #[serde(default)]
    pub blocked_domains: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskToolInput {
    pub prompt: String,
    pub description: String,
    #[serde(default)]
    pub subagent_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoWriteToolInput {
    pub todos: Vec<TodoItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoItem {
    pub content: String,
    #[serde(default)]
    pub status: Option<String>,
}
