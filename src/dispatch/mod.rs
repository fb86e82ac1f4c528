use crate::config::{Category, Config};
use crate::types::{
    CommonInput, NotificationInput, PostToolUseInput, PreToolUseInput, StopInput,
    SubagentStopInput,
};
use serde::de::DeserializeOwned;
use std::fmt;
use thiserror::Error;

// ===================================================================
// HookEvent: closed set of known events plus an explicit Unknown
// ===================================================================

/// A classified hook event. Created once per invocation, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    PreToolUse(PreToolUseInput),
    PostToolUse(PostToolUseInput),
    Notification(NotificationInput),
    Stop(StopInput),
    SubagentStop(SubagentStopInput),
    /// Any event name this notifier doesn't know about. Rendered with the
    /// generic formatter rather than dropped.
    Unknown {
        event_name: String,
        session_id: String,
        raw: serde_json::Value,
    },
}

/// Discriminant of [`HookEvent`], used for filtering and styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    PreToolUse,
    PostToolUse,
    Notification,
    Stop,
    SubagentStop,
    Unknown,
}

impl EventKind {
    pub fn category(self) -> Category {
        match self {
            EventKind::PreToolUse | EventKind::PostToolUse => Category::ToolActivity,
            EventKind::Notification => Category::Notifications,
            EventKind::Stop | EventKind::SubagentStop => Category::Completion,
            EventKind::Unknown => Category::Default,
        }
    }
}

impl HookEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HookEvent::PreToolUse(_) => EventKind::PreToolUse,
            HookEvent::PostToolUse(_) => EventKind::PostToolUse,
            HookEvent::Notification(_) => EventKind::Notification,
            HookEvent::Stop(_) => EventKind::Stop,
            HookEvent::SubagentStop(_) => EventKind::SubagentStop,
            HookEvent::Unknown { .. } => EventKind::Unknown,
        }
    }

    /// The hook event name as the host spells it.
    pub fn event_name(&self) -> &str {
        match self {
            HookEvent::PreToolUse(_) => "PreToolUse",
            HookEvent::PostToolUse(_) => "PostToolUse",
            HookEvent::Notification(_) => "Notification",
            HookEvent::Stop(_) => "Stop",
            HookEvent::SubagentStop(_) => "SubagentStop",
            HookEvent::Unknown { event_name, .. } => event_name,
        }
    }

    /// Common fields, for every variant except `Unknown`.
    pub fn common(&self) -> Option<&CommonInput> {
        match self {
            HookEvent::PreToolUse(e) => Some(&e.common),
            HookEvent::PostToolUse(e) => Some(&e.common),
            HookEvent::Notification(e) => Some(&e.common),
            HookEvent::Stop(e) => Some(&e.common),
            HookEvent::SubagentStop(e) => Some(&e.common),
            HookEvent::Unknown { .. } => None,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            HookEvent::Unknown { session_id, .. } => session_id,
            other => other.common().map_or("unknown", |c| c.session_id.as_str()),
        }
    }

    /// Tool name for tool-bearing events.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            HookEvent::PreToolUse(e) => Some(&e.tool_name),
            HookEvent::PostToolUse(e) => Some(&e.tool_name),
            _ => None,
        }
    }

    pub fn cwd(&self) -> Option<&str> {
        self.common().and_then(|c| c.cwd.as_deref())
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tool_name() {
            Some(tool) => write!(f, "{}({tool})", self.event_name()),
            None => f.write_str(self.event_name()),
        }
    }
}

// ===================================================================
// Classification
// ===================================================================

/// Why a raw hook payload couldn't be turned into a [`HookEvent`].
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("hook payload is not a JSON object")]
    NotAnObject,

    #[error("hook payload has no string `hook_event_name`")]
    MissingEventName,

    #[error("invalid {event} payload: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

fn parse_variant<T: DeserializeOwned>(
    event: &str,
    raw: &serde_json::Value,
) -> Result<T, ClassificationError> {
    serde_json::from_value(raw.clone()).map_err(|source| ClassificationError::InvalidPayload {
        event: event.to_string(),
        source,
    })
}

/// Validate a raw hook payload and map it to a typed event.
pub fn classify(raw: &serde_json::Value) -> Result<HookEvent, ClassificationError> {
    let obj = raw.as_object().ok_or(ClassificationError::NotAnObject)?;
    let name = obj
        .get("hook_event_name")
        .and_then(|v| v.as_str())
        .ok_or(ClassificationError::MissingEventName)?;

    let event = match name {
        "PreToolUse" => HookEvent::PreToolUse(parse_variant(name, raw)?),
        "PostToolUse" => HookEvent::PostToolUse(parse_variant(name, raw)?),
        "Notification" => HookEvent::Notification(parse_variant(name, raw)?),
        "Stop" => HookEvent::Stop(parse_variant(name, raw)?),
        "SubagentStop" => HookEvent::SubagentStop(parse_variant(name, raw)?),
        other => HookEvent::Unknown {
            event_name: other.to_string(),
            session_id: obj
                .get("session_id")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            raw: raw.clone(),
        },
    };
    Ok(event)
}

// ===================================================================
// Filtering
// ===================================================================

fn event_flag(kind: EventKind, config: &Config) -> bool {
    match kind {
        EventKind::PreToolUse => config.events.pre_tool_use,
        EventKind::PostToolUse => config.events.post_tool_use,
        EventKind::Notification => config.events.notification,
        EventKind::Stop => config.events.stop,
        EventKind::SubagentStop => config.events.subagent_stop,
        EventKind::Unknown => true,
    }
}

/// Whether an event should be sent. Event-level and tool-level gates are
/// independent: both must pass.
pub fn should_emit(event: &HookEvent, config: &Config) -> bool {
    let name = event.event_name();
    let listed = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(name));

    let event_enabled = event_flag(event.kind(), config)
        && config.enabled_events.as_deref().is_none_or(listed)
        && !listed(&config.disabled_events);

    let tool_enabled = event.tool_name().is_none_or(|tool| config.tool_enabled(tool));

    event_enabled && tool_enabled
}
