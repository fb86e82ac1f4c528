use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_THREAD_PREFIX: &str = "Session";
pub const DEFAULT_THREAD_NAME_TEMPLATE: &str = "{{ prefix }} {{ short_id }}";
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Dotenv-style file read from the host CLI's hooks directory.
const ENV_FILE_NAME: &str = ".env.discord";
const THREAD_STORE_FILE: &str = "discord_threads.json";

const TRUTHY: &[&str] = &["true", "1", "yes", "on", "enabled"];
const FALSY: &[&str] = &["false", "0", "no", "off", "disabled"];

// ===================================================================
// Errors
// ===================================================================

/// A problem with one configuration value or the config file.
///
/// Never fatal: the offending key keeps whatever value the previous layer
/// gave it, and the error is only surfaced in debug logs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key}: {value:?} is not a boolean (expected one of true/1/yes/on/enabled or false/0/no/off/disabled)")]
    InvalidBool { key: String, value: String },

    #[error("{key}: {value:?} is invalid (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("reading {}: {message}", path.display())]
    File { path: PathBuf, message: String },
}

// ===================================================================
// Config
// ===================================================================

/// Whether threads are created in a text channel or as forum posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelType {
    #[default]
    Text,
    Forum,
}

/// Routing bucket used to pick a per-category channel override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    ToolActivity,
    Notifications,
    Completion,
    Default,
}

/// Per-event enable flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFlags {
    pub pre_tool_use: bool,
    pub post_tool_use: bool,
    pub notification: bool,
    pub stop: bool,
    pub subagent_stop: bool,
}

impl Default for EventFlags {
    fn default() -> Self {
        Self {
            pre_tool_use: true,
            post_tool_use: true,
            notification: true,
            stop: true,
            subagent_stop: true,
        }
    }
}

/// Optional per-category channel overrides for the bot API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRouting {
    pub tool_activity: Option<String>,
    pub notifications: Option<String>,
    pub completion: Option<String>,
}

/// Fully resolved notifier configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub webhook_url: Option<String>,
    pub bot_token: Option<String>,
    pub channel_id: Option<String>,
    pub api_base: String,
    pub events: EventFlags,
    /// When set, only these hook event names are emitted.
    pub enabled_events: Option<Vec<String>>,
    pub disabled_events: Vec<String>,
    /// Per-tool flags keyed by [`tool_key`].
    pub tools: BTreeMap<String, bool>,
    /// Tool names disabled via the list form, stored as [`tool_key`]s.
    pub disabled_tools: Vec<String>,
    pub use_threads: bool,
    pub thread_prefix: String,
    pub thread_name_template: String,
    pub channel_type: ChannelType,
    pub mention_user_id: Option<String>,
    pub debug: bool,
    pub timeout: Duration,
    pub routing: ChannelRouting,
    pub state_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_url: None,
            bot_token: None,
            channel_id: None,
            api_base: DEFAULT_API_BASE.to_string(),
            events: EventFlags::default(),
            enabled_events: None,
            disabled_events: Vec::new(),
            tools: BTreeMap::new(),
            disabled_tools: Vec::new(),
            use_threads: false,
            thread_prefix: DEFAULT_THREAD_PREFIX.to_string(),
            thread_name_template: DEFAULT_THREAD_NAME_TEMPLATE.to_string(),
            channel_type: ChannelType::Text,
            mention_user_id: None,
            debug: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            routing: ChannelRouting::default(),
            state_dir: default_state_dir(),
        }
    }
}

/// `~/.claude/hooks`, or a relative `.claude/hooks` if there is no home.
pub fn default_state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".claude")
        .join("hooks")
}

/// Default location of the dotenv-style config file.
pub fn default_env_file() -> PathBuf {
    default_state_dir().join(ENV_FILE_NAME)
}

/// Normalize a tool name into the suffix used by `DISCORD_TOOL_<NAME>`:
/// upper-cased, with every non-alphanumeric character replaced by `_`.
pub fn tool_key(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Parse a boolean flag value using the documented spellings.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    let v = value.trim().to_ascii_lowercase();
    if TRUTHY.contains(&v.as_str()) {
        Ok(true)
    } else if FALSY.contains(&v.as_str()) {
        Ok(false)
    } else {
        Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Read the `KEY=value` pairs of a dotenv file without touching the
/// process environment. A missing file is not an error.
fn read_env_file(path: &Path) -> (Vec<(String, String)>, Vec<ConfigError>) {
    let file_error = |message: String| ConfigError::File {
        path: path.to_path_buf(),
        message,
    };
    let iter = match dotenv::from_path_iter(path) {
        Ok(iter) => iter,
        Err(dotenv::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            return (Vec::new(), Vec::new());
        }
        Err(e) => return (Vec::new(), vec![file_error(e.to_string())]),
    };

    let mut vars = Vec::new();
    let mut errors = Vec::new();
    for item in iter {
        match item {
            Ok(pair) => vars.push(pair),
            Err(e) => errors.push(file_error(e.to_string())),
        }
    }
    (vars, errors)
}

/// Process environment, skipping variables that aren't valid UTF-8.
fn process_env() -> impl Iterator<Item = (String, String)> {
    std::env::vars_os().filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
}

/// Order one layer so aliases are applied before the keys they alias and
/// lose to them regardless of how the source iterates.
fn by_precedence<I>(layer: I) -> Vec<(String, String)>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut vars: Vec<_> = layer.into_iter().collect();
    vars.sort_by_key(|(key, _)| key != "DISCORD_TOKEN");
    vars
}

impl Config {
    /// Load configuration: process environment over the dotenv file over
    /// built-in defaults. Never fails; problems are returned alongside the
    /// config so the caller can log them once logging is up.
    pub fn load(env_file: Option<&Path>) -> (Self, Vec<ConfigError>) {
        Self::load_from(env_file, process_env())
    }

    /// Like [`Config::load`], with an explicit environment.
    pub fn load_from<E>(env_file: Option<&Path>, env: E) -> (Self, Vec<ConfigError>)
    where
        E: IntoIterator<Item = (String, String)>,
    {
        let path = env_file.map(Path::to_path_buf).unwrap_or_else(default_env_file);
        let (file_vars, mut errors) = read_env_file(&path);
        let (config, layer_errors) = Self::from_sources(file_vars, env);
        errors.extend(layer_errors);
        (config, errors)
    }

    /// Apply the file layer, then the environment layer, onto defaults.
    pub fn from_sources<F, E>(file: F, env: E) -> (Self, Vec<ConfigError>)
    where
        F: IntoIterator<Item = (String, String)>,
        E: IntoIterator<Item = (String, String)>,
    {
        let mut config = Config::default();
        let mut errors = Vec::new();
        for (key, value) in by_precedence(file).into_iter().chain(by_precedence(env)) {
            if let Err(e) = config.apply(&key, &value) {
                errors.push(e);
            }
        }
        (config, errors)
    }

    /// Apply a single key. Unknown keys and empty values are ignored; on
    /// error the field is left untouched.
    fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        let owned = || Some(value.to_string());

        match key {
            "DISCORD_WEBHOOK_URL" => self.webhook_url = owned(),
            "DISCORD_BOT_TOKEN" | "DISCORD_TOKEN" => self.bot_token = owned(),
            "DISCORD_CHANNEL_ID" => self.channel_id = owned(),
            "DISCORD_API_BASE" => self.api_base = value.trim_end_matches('/').to_string(),

            "DISCORD_EVENT_PRE_TOOL_USE" => self.events.pre_tool_use = parse_bool(key, value)?,
            "DISCORD_EVENT_POST_TOOL_USE" => self.events.post_tool_use = parse_bool(key, value)?,
            "DISCORD_EVENT_NOTIFICATION" => self.events.notification = parse_bool(key, value)?,
            "DISCORD_EVENT_STOP" => self.events.stop = parse_bool(key, value)?,
            "DISCORD_EVENT_SUBAGENT_STOP" => self.events.subagent_stop = parse_bool(key, value)?,
            "DISCORD_ENABLED_EVENTS" => self.enabled_events = Some(split_list(value)),
            "DISCORD_DISABLED_EVENTS" => self.disabled_events = split_list(value),
            "DISCORD_DISABLED_TOOLS" => {
                self.disabled_tools = split_list(value).iter().map(|t| tool_key(t)).collect()
            }

            "DISCORD_USE_THREADS" => self.use_threads = parse_bool(key, value)?,
            "DISCORD_THREAD_PREFIX" => self.thread_prefix = value.to_string(),
            "DISCORD_THREAD_NAME_TEMPLATE" => self.thread_name_template = value.to_string(),
            "DISCORD_CHANNEL_TYPE" => {
                self.channel_type = match value.to_ascii_lowercase().as_str() {
                    "text" => ChannelType::Text,
                    "forum" => ChannelType::Forum,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: value.to_string(),
                            expected: "text or forum",
                        });
                    }
                }
            }
            "DISCORD_MENTION_USER_ID" => {
                if !value.chars().all(|c| c.is_ascii_digit()) {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                        expected: "a numeric Discord user id",
                    });
                }
                self.mention_user_id = owned();
            }
            "DISCORD_DEBUG" => self.debug = parse_bool(key, value)?,
            "DISCORD_TIMEOUT_SECS" => match value.parse::<u64>() {
                Ok(secs) if secs > 0 => self.timeout = Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                        expected: "a positive number of seconds",
                    });
                }
            },

            "DISCORD_CHANNEL_TOOL_ACTIVITY" => self.routing.tool_activity = owned(),
            "DISCORD_CHANNEL_NOTIFICATIONS" => self.routing.notifications = owned(),
            "DISCORD_CHANNEL_COMPLETION" => self.routing.completion = owned(),
            "DISCORD_STATE_DIR" => self.state_dir = PathBuf::from(value),

            _ => {
                if let Some(tool) = key.strip_prefix("DISCORD_TOOL_") {
                    let enabled = parse_bool(key, value)?;
                    self.tools.insert(tool_key(tool), enabled);
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Derived views
    // ---------------------------------------------------------------

    /// Whether a tool passes both the per-tool flag and the disabled list.
    pub fn tool_enabled(&self, tool_name: &str) -> bool {
        let key = tool_key(tool_name);
        let flag = self.tools.get(&key).copied().unwrap_or(true);
        flag && !self.disabled_tools.contains(&key)
    }

    /// Channel for a category: the routing override, else the base channel.
    pub fn channel_for(&self, category: Category) -> Option<&str> {
        let routed = match category {
            Category::ToolActivity => self.routing.tool_activity.as_deref(),
            Category::Notifications => self.routing.notifications.as_deref(),
            Category::Completion => self.routing.completion.as_deref(),
            Category::Default => None,
        };
        routed.or(self.channel_id.as_deref())
    }

    /// Bot token plus the channel a given category would post to.
    pub fn bot_credentials(&self, category: Category) -> Option<(&str, &str)> {
        Some((self.bot_token.as_deref()?, self.channel_for(category)?))
    }

    pub fn thread_store_path(&self) -> PathBuf {
        self.state_dir.join(THREAD_STORE_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.state_dir.join("debug")
    }
}
