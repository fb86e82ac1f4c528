//! Delivery of formatted messages to Discord, by webhook or bot API.

mod threads;

use crate::config::{Category, Config};
use crate::message::{truncate, DiscordMessage};
use crate::thread_store::{JsonThreadStore, ThreadStore};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

const USER_AGENT: &str = concat!("DiscordBot (discord-notifier, ", env!("CARGO_PKG_VERSION"), ")");

/// Longest response body kept in an error.
const ERROR_BODY_LIMIT: usize = 500;

// ===================================================================
// Errors
// ===================================================================

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no Discord webhook URL or bot token/channel configured")]
    NoCredentials,

    #[error("request to Discord failed: {0}")]
    Network(#[source] reqwest::Error),

    #[error("Discord rejected the credentials (HTTP {status})")]
    Auth { status: u16 },

    #[error("rate limited by Discord (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<f64> },

    #[error("Discord rejected the request (HTTP {status}): {body}")]
    MalformedRequest { status: u16, body: String },

    #[error("unexpected Discord response: {0}")]
    Unknown(String),
}

/// Stable, loggable name for each [`DeliveryError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryErrorKind {
    NoCredentials,
    Network,
    Auth,
    RateLimited,
    MalformedRequest,
    Unknown,
}

impl DeliveryErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryErrorKind::NoCredentials => "no-credentials",
            DeliveryErrorKind::Network => "network",
            DeliveryErrorKind::Auth => "auth",
            DeliveryErrorKind::RateLimited => "rate-limited",
            DeliveryErrorKind::MalformedRequest => "malformed-request",
            DeliveryErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DeliveryError {
    pub fn kind(&self) -> DeliveryErrorKind {
        match self {
            DeliveryError::NoCredentials => DeliveryErrorKind::NoCredentials,
            DeliveryError::Network(_) => DeliveryErrorKind::Network,
            DeliveryError::Auth { .. } => DeliveryErrorKind::Auth,
            DeliveryError::RateLimited { .. } => DeliveryErrorKind::RateLimited,
            DeliveryError::MalformedRequest { .. } => DeliveryErrorKind::MalformedRequest,
            DeliveryError::Unknown(_) => DeliveryErrorKind::Unknown,
        }
    }
}

#[derive(Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
}

/// Map a non-success status to an error kind.
fn classify_status(status: StatusCode, body: &str, retry_header: Option<f64>) -> DeliveryError {
    match status.as_u16() {
        401 | 403 => DeliveryError::Auth {
            status: status.as_u16(),
        },
        429 => DeliveryError::RateLimited {
            retry_after: serde_json::from_str::<RateLimitBody>(body)
                .ok()
                .and_then(|b| b.retry_after)
                .or(retry_header),
        },
        400..=499 => DeliveryError::MalformedRequest {
            status: status.as_u16(),
            body: truncate(body, ERROR_BODY_LIMIT),
        },
        _ => DeliveryError::Unknown(format!("HTTP {status}: {}", truncate(body, ERROR_BODY_LIMIT))),
    }
}

/// Send a request and turn any non-2xx response into a [`DeliveryError`].
fn execute(request: RequestBuilder) -> Result<Response, DeliveryError> {
    let response = request.send().map_err(DeliveryError::Network)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let retry_header = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());
    let body = response.text().unwrap_or_default();
    Err(classify_status(status, &body, retry_header))
}

#[derive(Deserialize)]
struct IdOnly {
    id: String,
}

/// Read `id` from a JSON response body, if there is one.
fn response_id(response: Response) -> Option<String> {
    response.json::<IdOnly>().ok().map(|r| r.id)
}

// ===================================================================
// Client
// ===================================================================

/// Who is sending, and where it should be grouped.
#[derive(Debug, Clone)]
pub struct Delivery<'a> {
    pub session_id: &'a str,
    pub category: Category,
    pub event_name: &'a str,
    pub project: Option<&'a str>,
}

/// How a message reached Discord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Webhook,
    Channel,
    Thread,
    /// A new forum post whose starter message is the notification.
    ForumPost,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    pub route: Route,
    /// Channel or thread posted to; absent for webhooks.
    pub channel_id: Option<String>,
    pub message_id: Option<String>,
}

pub struct DiscordClient<'a, S = JsonThreadStore> {
    http: Client,
    config: &'a Config,
    store: S,
}

impl<'a> DiscordClient<'a> {
    /// Client backed by the on-disk thread store under the state directory.
    pub fn new(config: &'a Config) -> Result<Self, DeliveryError> {
        Self::with_store(config, JsonThreadStore::new(config.thread_store_path()))
    }
}

impl<'a, S: ThreadStore> DiscordClient<'a, S> {
    pub fn with_store(config: &'a Config, store: S) -> Result<Self, DeliveryError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DeliveryError::Unknown(format!("building HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            store,
        })
    }

    /// Deliver one message. Thread mode needs the bot API, so it wins when
    /// bot credentials are present; otherwise the webhook is preferred.
    pub fn send(&self, message: &DiscordMessage, delivery: &Delivery) -> Result<Sent, DeliveryError> {
        let bot = self.config.bot_credentials(delivery.category);

        if self.config.use_threads {
            match bot {
                Some((token, channel)) => {
                    return self.send_threaded(message, delivery, token, channel);
                }
                None => tracing::debug!("thread mode needs a bot token and channel, skipping threads"),
            }
        }
        if let Some(url) = self.config.webhook_url.as_deref() {
            return self.send_webhook(url, message);
        }
        if let Some((token, channel)) = bot {
            return self.post_message(token, channel, message);
        }
        Err(DeliveryError::NoCredentials)
    }

    fn send_webhook(&self, url: &str, message: &DiscordMessage) -> Result<Sent, DeliveryError> {
        tracing::debug!("posting to webhook");
        let response = execute(self.http.post(url).query(&[("wait", "true")]).json(message))?;
        Ok(Sent {
            route: Route::Webhook,
            channel_id: None,
            message_id: response_id(response),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base.trim_end_matches('/'))
    }

    fn bot_request(&self, method: reqwest::Method, token: &str, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.api_url(path))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {token}"))
    }

    /// `POST /channels/{id}/messages`; `channel_id` may be a thread.
    fn post_message(
        &self,
        token: &str,
        channel_id: &str,
        message: &DiscordMessage,
    ) -> Result<Sent, DeliveryError> {
        tracing::debug!(channel_id, "posting to channel");
        let path = format!("/channels/{channel_id}/messages");
        let response = execute(self.bot_request(reqwest::Method::POST, token, &path).json(message))?;
        Ok(Sent {
            route: Route::Channel,
            channel_id: Some(channel_id.to_string()),
            message_id: response_id(response),
        })
    }
}
