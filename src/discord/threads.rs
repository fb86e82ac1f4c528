//! One Discord thread per session and channel, created on first use and
//! reused for the rest of the session.

use super::{execute, response_id, Delivery, DeliveryError, DiscordClient, Route, Sent};
use crate::config::{ChannelType, Config};
use crate::format::{clean, short_id};
use crate::message::{truncate, DiscordMessage, THREAD_NAME_LIMIT};
use crate::thread_store::{Claim, NewThread, ThreadStore};
use minijinja::{context, Environment};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

/// Discord's `PUBLIC_THREAD` channel type.
const PUBLIC_THREAD: u8 = 11;
/// Minutes of inactivity before Discord archives the thread (one day).
const AUTO_ARCHIVE_MINUTES: u32 = 1440;

/// Render the configured thread-name template. Falls back to
/// `"{prefix} {short_id}"` when the template is invalid or renders empty.
pub fn thread_name(config: &Config, delivery: &Delivery) -> String {
    let prefix = config.thread_prefix.as_str();
    let short = short_id(delivery.session_id);
    let env = Environment::new();
    let rendered = env
        .template_from_str(&config.thread_name_template)
        .and_then(|tmpl| {
            tmpl.render(context! {
                prefix,
                short_id => short,
                session_id => delivery.session_id,
                project => delivery.project,
                event => delivery.event_name,
            })
        });
    let name = match rendered {
        Ok(name) if !name.trim().is_empty() => name,
        Ok(_) => format!("{prefix} {short}"),
        Err(e) => {
            tracing::warn!(error = %e, "thread name template failed, using default");
            format!("{prefix} {short}")
        }
    };
    truncate(clean(&name).replace('\n', " ").trim(), THREAD_NAME_LIMIT)
}

#[derive(Deserialize)]
struct ThreadChannel {
    #[serde(default)]
    thread_metadata: Option<ThreadMetadata>,
}

#[derive(Deserialize)]
struct ThreadMetadata {
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    locked: bool,
}

enum ThreadState {
    Open,
    Closed,
    Gone,
}

/// Where resolution left us.
enum Resolved {
    /// Post the message into this thread.
    Thread(String),
    /// Creating a forum post already delivered the message.
    Delivered(Sent),
}

impl<S: ThreadStore> DiscordClient<'_, S> {
    /// Post into the session's thread, falling back when the thread can't
    /// be found, reopened, or created.
    pub(super) fn send_threaded(
        &self,
        message: &DiscordMessage,
        delivery: &Delivery,
        token: &str,
        channel_id: &str,
    ) -> Result<Sent, DeliveryError> {
        let thread_id = match self.resolve_thread(message, delivery, token, channel_id) {
            Ok(Resolved::Delivered(sent)) => return Ok(sent),
            Ok(Resolved::Thread(id)) => id,
            Err(e) => {
                tracing::warn!(kind = %e.kind(), error = %e, "thread unavailable, falling back");
                return self.fall_back(token, channel_id, message, e);
            }
        };
        match self.post_message(token, &thread_id, message) {
            Ok(sent) => Ok(Sent {
                route: Route::Thread,
                ..sent
            }),
            Err(e @ (DeliveryError::Auth { .. } | DeliveryError::RateLimited { .. })) => Err(e),
            Err(e) => {
                tracing::warn!(thread_id, kind = %e.kind(), error = %e, "posting to thread failed, falling back");
                self.fall_back(token, channel_id, message, e)
            }
        }
    }

    /// Post to the parent channel. Forum channels reject plain messages, so
    /// a forum falls back to the webhook if one is configured and otherwise
    /// reports `cause`.
    fn fall_back(
        &self,
        token: &str,
        channel_id: &str,
        message: &DiscordMessage,
        cause: DeliveryError,
    ) -> Result<Sent, DeliveryError> {
        if self.config.channel_type != ChannelType::Forum {
            return self.post_message(token, channel_id, message);
        }
        match self.config.webhook_url.as_deref() {
            Some(url) => self.send_webhook(url, message),
            None => Err(cause),
        }
    }

    fn resolve_thread(
        &self,
        message: &DiscordMessage,
        delivery: &Delivery,
        token: &str,
        channel_id: &str,
    ) -> Result<Resolved, DeliveryError> {
        let session_id = delivery.session_id;
        let known = self
            .store
            .get_thread_id(session_id, channel_id)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %format!("{e:#}"), "reading thread store");
                None
            });

        let mut stale = None;
        if let Some(thread_id) = known {
            match self.thread_state(token, &thread_id)? {
                ThreadState::Open => return Ok(Resolved::Thread(thread_id)),
                ThreadState::Closed => match self.reopen_thread(token, &thread_id) {
                    Ok(()) => return Ok(Resolved::Thread(thread_id)),
                    Err(e) => {
                        tracing::warn!(thread_id, error = %e, "could not reopen thread, creating a new one");
                    }
                },
                ThreadState::Gone => {
                    tracing::debug!(thread_id, "thread no longer exists, forgetting it");
                    if let Err(e) = self.store.remove_thread_id(session_id, channel_id) {
                        tracing::warn!(error = %format!("{e:#}"), "updating thread store");
                    }
                }
            }
            stale = Some(thread_id);
        }

        let claim = self.store.claim_thread(session_id, channel_id, stale.as_deref(), || {
            self.create_thread(message, delivery, token, channel_id)
        })?;
        match claim {
            Claim::Created(resolved) => Ok(resolved),
            Claim::Existing(thread_id) => {
                tracing::debug!(thread_id, "thread created by a concurrent hook, reusing it");
                Ok(Resolved::Thread(thread_id))
            }
        }
    }

    fn thread_state(&self, token: &str, thread_id: &str) -> Result<ThreadState, DeliveryError> {
        let path = format!("/channels/{thread_id}");
        match execute(self.bot_request(Method::GET, token, &path)) {
            Ok(response) => {
                let channel: ThreadChannel = response
                    .json()
                    .map_err(|e| DeliveryError::Unknown(format!("parsing thread {thread_id}: {e}")))?;
                let closed = channel
                    .thread_metadata
                    .is_some_and(|m| m.archived || m.locked);
                Ok(if closed { ThreadState::Closed } else { ThreadState::Open })
            }
            Err(DeliveryError::MalformedRequest { status: 404, .. }) => Ok(ThreadState::Gone),
            Err(e) => Err(e),
        }
    }

    fn reopen_thread(&self, token: &str, thread_id: &str) -> Result<(), DeliveryError> {
        tracing::debug!(thread_id, "unarchiving thread");
        let path = format!("/channels/{thread_id}");
        let body = json!({ "archived": false, "locked": false });
        execute(self.bot_request(Method::PATCH, token, &path).json(&body)).map(drop)
    }

    fn create_thread(
        &self,
        message: &DiscordMessage,
        delivery: &Delivery,
        token: &str,
        channel_id: &str,
    ) -> Result<NewThread<Resolved>, DeliveryError> {
        let name = thread_name(self.config, delivery);
        let forum = self.config.channel_type == ChannelType::Forum;
        let body = if forum {
            json!({
                "name": name,
                "auto_archive_duration": AUTO_ARCHIVE_MINUTES,
                "message": message,
            })
        } else {
            json!({
                "name": name,
                "type": PUBLIC_THREAD,
                "auto_archive_duration": AUTO_ARCHIVE_MINUTES,
            })
        };

        tracing::debug!(channel_id, name = %name, forum, "creating thread");
        let path = format!("/channels/{channel_id}/threads");
        let response = execute(self.bot_request(Method::POST, token, &path).json(&body))?;
        let thread_id = response_id(response)
            .ok_or_else(|| DeliveryError::Unknown("thread created without an id".to_string()))?;

        let resolved = if forum {
            Resolved::Delivered(Sent {
                route: Route::ForumPost,
                channel_id: Some(thread_id.clone()),
                message_id: None,
            })
        } else {
            Resolved::Thread(thread_id.clone())
        };
        Ok(NewThread {
            thread_id,
            name,
            value: resolved,
        })
    }
}
