use crate::message::truncate;
use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter override, e.g. `DISCORD_NOTIFIER_LOG=discord_notifier=trace`.
pub const LOG_FILTER_ENV: &str = "DISCORD_NOTIFIER_LOG";
const DEFAULT_FILTER: &str = "debug";
const LOG_FILE_PREFIX: &str = "discord-notifier";
const MAX_LOG_FILES: usize = 7;

/// Longest user-supplied string written into a log line.
pub const LOG_VALUE_LIMIT: usize = 200;

/// Install a file-only subscriber writing daily-rotated logs to `dir`.
/// Nothing goes to stdout or stderr, which belong to the hook host.
pub fn init(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .context("creating log file appender")?;

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    let env_filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .context("installing log subscriber")?;

    tracing::debug!(dir = %dir.display(), "logging initialized");
    Ok(())
}

/// Make an untrusted string safe for a single log line: control characters
/// (newlines included) are escaped and the result is capped at
/// [`LOG_VALUE_LIMIT`] characters.
pub fn sanitize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_control() {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    truncate(&out, LOG_VALUE_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newlines_cannot_forge_log_lines() {
        let s = sanitize("ok\n2026-01-01T00:00:00Z  INFO forged entry\r");
        assert!(!s.contains('\n') && !s.contains('\r'));
        assert!(s.starts_with("ok\\n2026"));
        assert!(s.ends_with("\\r"));
    }

    #[test]
    fn escape_sequences_are_neutralized() {
        assert_eq!(sanitize("\u{1b}[31mred"), "\\u{1b}[31mred");
        assert_eq!(sanitize("tab\there"), "tab\\there");
    }

    #[test]
    fn printable_text_passes_through() {
        assert_eq!(sanitize("Édition «ok» 日本"), "Édition «ok» 日本");
    }

    #[test]
    fn long_values_are_capped() {
        let s = sanitize(&"x".repeat(1000));
        assert_eq!(s.chars().count(), LOG_VALUE_LIMIT);
    }
}
