use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;

// ===================================================================
// Minimal transcript model: only what a session summary needs
// ===================================================================

/// One line of a Claude Code `.jsonl` transcript. Everything that isn't an
/// assistant message collapses into `Other`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum TranscriptEntry {
    #[serde(rename = "assistant")]
    Assistant { message: Message },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: MessageContent,
}

/// `message.content` can be a plain string or an array of content blocks.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse { name: String },
    #[serde(other)]
    Other,
}

// ===================================================================
// Summary
// ===================================================================

/// What a session (or subagent) did, for Stop/SubagentStop embeds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TranscriptSummary {
    pub tool_uses: usize,
    /// e.g. "edited 2 files, ran 3 commands"
    pub activity: Option<String>,
    /// Text of the most recent assistant message that had any.
    pub last_response: Option<String>,
}

impl TranscriptSummary {
    /// Summarize a JSONL transcript. Returns the summary and any lines that
    /// failed to parse (with 1-based line number and error).
    pub fn parse(contents: &str) -> (Self, Vec<(usize, String)>) {
        let mut counts = ToolCounts::default();
        let mut tool_uses = 0;
        let mut last_response = None;
        let mut errors = Vec::new();

        for (i, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let message = match serde_json::from_str::<TranscriptEntry>(line) {
                Ok(TranscriptEntry::Assistant { message }) => message,
                Ok(TranscriptEntry::Other) => continue,
                Err(e) => {
                    errors.push((i + 1, format!("{e}")));
                    continue;
                }
            };
            let blocks = match message.content {
                MessageContent::Blocks(b) => b,
                MessageContent::Text(t) => {
                    if !t.trim().is_empty() {
                        last_response = Some(t.trim().to_string());
                    }
                    continue;
                }
            };

            let mut texts = Vec::new();
            for block in blocks {
                match block {
                    ContentBlock::ToolUse { name } => {
                        tool_uses += 1;
                        counts.count(&name);
                    }
                    ContentBlock::Text { text } => {
                        let trimmed = text.trim();
                        if !trimmed.is_empty() {
                            texts.push(trimmed.to_string());
                        }
                    }
                    ContentBlock::Other => {}
                }
            }
            if !texts.is_empty() {
                last_response = Some(texts.join("\n\n"));
            }
        }

        let summary = Self {
            tool_uses,
            activity: counts.format_short(),
            last_response,
        };
        (summary, errors)
    }

    /// Read and summarize the transcript at `path`. `None` if it doesn't exist.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("reading transcript {}", path.display()));
            }
        };
        let (summary, errors) = Self::parse(&contents);
        for (line, err) in &errors {
            tracing::debug!(line, error = %err, "skipping unparsable transcript line");
        }
        Ok(Some(summary))
    }
}

// ===================================================================
// Tool categorization
// ===================================================================

/// Per-category tool counters, in display order.
#[derive(Default)]
struct ToolCounts {
    edited: usize,
    wrote: usize,
    read: usize,
    ran: usize,
    searched: usize,
    fetched: usize,
    delegated: usize,
}

impl ToolCounts {
    fn count(&mut self, name: &str) {
        let slot = match name {
            "Edit" | "MultiEdit" | "NotebookEdit" => &mut self.edited,
            "Write" => &mut self.wrote,
            "Read" => &mut self.read,
            "Bash" => &mut self.ran,
            "Grep" | "Glob" => &mut self.searched,
            "WebFetch" | "WebSearch" => &mut self.fetched,
            "Task" => &mut self.delegated,
            _ => return,
        };
        *slot += 1;
    }

    /// "edited 2 files, ran 3 commands"
    fn format_short(&self) -> Option<String> {
        let plural = |n: usize, one: &'static str, many: &'static str| if n == 1 { one } else { many };
        let parts: Vec<String> = [
            ("edited", self.edited, "file", "files"),
            ("wrote", self.wrote, "file", "files"),
            ("read", self.read, "file", "files"),
            ("ran", self.ran, "command", "commands"),
            ("searched", self.searched, "pattern", "patterns"),
            ("fetched", self.fetched, "url", "urls"),
            ("delegated", self.delegated, "task", "tasks"),
        ]
        .into_iter()
        .filter(|(_, n, _, _)| *n > 0)
        .map(|(verb, n, one, many)| format!("{verb} {n} {}", plural(n, one, many)))
        .collect();

        if parts.is_empty() { None } else { Some(parts.join(", ")) }
    }
}
