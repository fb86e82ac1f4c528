use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Dumps older than this are deleted on each debug run.
pub const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

const MASK: &str = "***";
const SENSITIVE_KEYS: &[&str] = &["token", "secret", "password", "authorization", "webhook"];

/// Paired input/output JSON files for one invocation, named
/// `<timestamp>_<event>_<uuid>_{input,output}.json`.
pub struct DebugDump {
    dir: PathBuf,
    stem: String,
}

impl DebugDump {
    pub fn new(dir: &Path, event_name: &str, now: DateTime<Utc>) -> Self {
        let event: String = event_name
            .chars()
            .take(40)
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let stem = format!(
            "{}_{}_{}",
            now.format("%Y%m%dT%H%M%S%.3fZ"),
            if event.is_empty() { "unknown" } else { event.as_str() },
            uuid::Uuid::new_v4().simple()
        );
        Self {
            dir: dir.to_path_buf(),
            stem,
        }
    }

    pub fn write_input(&self, input: &Value) -> Result<PathBuf> {
        self.write("input", input)
    }

    pub fn write_output<T: Serialize>(&self, output: &T) -> Result<PathBuf> {
        let value = serde_json::to_value(output).context("serializing debug output")?;
        self.write("output", &value)
    }

    fn write(&self, kind: &str, value: &Value) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.dir.join(format!("{}_{kind}.json", self.stem));
        let json = serde_json::to_string_pretty(&mask(value)).context("serializing debug dump")?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

fn looks_like_webhook(s: &str) -> bool {
    s.contains("/api/webhooks/")
}

/// Copy of `value` with credential-bearing keys and webhook URLs masked.
pub fn mask(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| {
                    let masked = if is_sensitive_key(k) && !v.is_null() {
                        Value::String(MASK.to_string())
                    } else {
                        mask(v)
                    };
                    (k.clone(), masked)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(mask).collect()),
        Value::String(s) if looks_like_webhook(s) => Value::String(MASK.to_string()),
        other => other.clone(),
    }
}

/// Delete `.json` dumps in `dir` last modified more than `max_age` before
/// `now`. Returns how many were removed. A missing directory is empty.
pub fn prune(dir: &Path, now: SystemTime, max_age: Duration) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).with_context(|| format!("reading {}", dir.display())),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("reading {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let modified = entry.metadata().and_then(|m| m.modified());
        let expired = modified
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .is_some_and(|age| age > max_age);
        if expired {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::debug!(path = %path.display(), error = %e, "could not remove old dump"),
            }
        }
    }
    Ok(removed)
}
