use crate::config::Config;
use crate::debug_dump::{self, DebugDump};
use crate::discord::{Delivery, DeliveryError, DiscordClient, Sent};
use crate::dispatch::{classify, should_emit, ClassificationError, HookEvent};
use crate::format::{file_name, format_event, headline, FormatContext};
use crate::logging::sanitize;
use crate::message::DiscordMessage;
use crate::transcript::TranscriptSummary;
use chrono::Utc;
use serde_json::{json, Value};
use std::io::{self, Read};
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

/// Longest raw input kept in a debug dump when it isn't valid JSON.
const UNPARSED_DUMP_LIMIT: usize = 10_000;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("reading hook input: {0}")]
    Stdin(#[source] io::Error),

    #[error("hook input is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// What happened to one hook event.
#[derive(Debug)]
pub enum Outcome {
    Delivered(Sent),
    /// Disabled by an event or tool filter.
    Filtered,
    /// Formatted but not sent.
    DryRun(DiscordMessage),
}

/// Read one hook payload from `input` and process it.
pub fn run<R: Read>(config: &Config, mut input: R, dry_run: bool) -> Result<Outcome, NotifyError> {
    if config.debug {
        match debug_dump::prune(&config.debug_dir(), SystemTime::now(), debug_dump::RETENTION) {
            Ok(0) => {}
            Ok(n) => tracing::debug!(removed = n, "pruned old debug dumps"),
            Err(e) => tracing::warn!(error = %format!("{e:#}"), "pruning debug dumps"),
        }
    }

    let mut buffer = String::new();
    input.read_to_string(&mut buffer).map_err(NotifyError::Stdin)?;
    Notifier::new(config, dry_run).process(&buffer)
}

pub struct Notifier<'a> {
    config: &'a Config,
    dry_run: bool,
}

impl<'a> Notifier<'a> {
    pub fn new(config: &'a Config, dry_run: bool) -> Self {
        Self { config, dry_run }
    }

    /// parse → classify → filter → format → deliver.
    pub fn process(&self, input: &str) -> Result<Outcome, NotifyError> {
        let raw: Value = match serde_json::from_str(input) {
            Ok(v) => v,
            Err(e) => {
                self.dump("invalid", |d| {
                    let unparsed: String = input.chars().take(UNPARSED_DUMP_LIMIT).collect();
                    d.write_input(&json!({ "unparsed": unparsed }))
                });
                return Err(NotifyError::InvalidJson(e));
            }
        };

        let event = match classify(&raw) {
            Ok(event) => event,
            Err(e) => {
                self.dump("invalid", |d| d.write_input(&raw));
                return Err(e.into());
            }
        };
        let dump = self.debug_dump(event.event_name());
        if let Some(d) = &dump {
            log_dump(d.write_input(&raw));
        }

        tracing::debug!(event = %sanitize(&event.to_string()), session = %sanitize(event.session_id()), "received hook event");

        if !should_emit(&event, self.config) {
            tracing::debug!(event = %sanitize(&event.to_string()), "filtered by configuration");
            return Ok(Outcome::Filtered);
        }

        let ctx = FormatContext {
            mention_user_id: self.config.mention_user_id.clone(),
            summary: self.transcript_summary(&event),
        };
        let message = format_event(&event, &ctx).stamp(&Utc::now().to_rfc3339());
        if let Some(d) = &dump {
            log_dump(d.write_output(&message));
        }

        if self.dry_run {
            return Ok(Outcome::DryRun(message));
        }

        let project = event.cwd().map(file_name);
        let delivery = Delivery {
            session_id: event.session_id(),
            category: event.kind().category(),
            event_name: event.event_name(),
            project: project.as_deref(),
        };
        let client = DiscordClient::new(self.config)?;
        let sent = client.send(&message, &delivery)?;
        tracing::info!(
            route = ?sent.route,
            channel_id = sent.channel_id.as_deref().unwrap_or("-"),
            message_id = sent.message_id.as_deref().unwrap_or("-"),
            headline = %sanitize(&headline(&event)),
            "delivered"
        );
        Ok(Outcome::Delivered(sent))
    }

    fn debug_dump(&self, event_name: &str) -> Option<DebugDump> {
        self.config
            .debug
            .then(|| DebugDump::new(&self.config.debug_dir(), event_name, Utc::now()))
    }

    fn dump<F>(&self, event_name: &str, write: F)
    where
        F: FnOnce(&DebugDump) -> anyhow::Result<std::path::PathBuf>,
    {
        if let Some(d) = self.debug_dump(event_name) {
            log_dump(write(&d));
        }
    }

    /// Session (or subagent) transcript summary for completion events.
    fn transcript_summary(&self, event: &HookEvent) -> Option<TranscriptSummary> {
        let path = match event {
            HookEvent::Stop(e) => e.common.transcript_path.as_deref(),
            HookEvent::SubagentStop(e) => e
                .agent_transcript_path
                .as_deref()
                .or(e.common.transcript_path.as_deref()),
            _ => None,
        }?;
        match TranscriptSummary::read(Path::new(path)) {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %sanitize(&format!("{e:#}")), "skipping transcript summary");
                None
            }
        }
    }
}

fn log_dump(result: anyhow::Result<std::path::PathBuf>) {
    match result {
        Ok(path) => tracing::debug!(path = %path.display(), "wrote debug dump"),
        Err(e) => tracing::warn!(error = %format!("{e:#}"), "writing debug dump"),
    }
}
