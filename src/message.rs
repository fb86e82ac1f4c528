use serde::Serialize;

// ===================================================================
// Discord limits
// ===================================================================

pub const TITLE_LIMIT: usize = 256;
pub const DESCRIPTION_LIMIT: usize = 4096;
pub const FIELD_NAME_LIMIT: usize = 256;
pub const FIELD_VALUE_LIMIT: usize = 1024;
pub const FOOTER_LIMIT: usize = 2048;
pub const CONTENT_LIMIT: usize = 2000;
pub const MAX_FIELDS: usize = 25;
/// Combined length of all text in one embed.
pub const EMBED_TOTAL_LIMIT: usize = 6000;
pub const THREAD_NAME_LIMIT: usize = 100;

pub const TRUNCATION_MARKER: &str = "…";

/// Truncate to at most `max` characters. When cut, the result is exactly
/// `max` characters and ends with [`TRUNCATION_MARKER`]. Cuts happen on
/// char boundaries, and already-short strings pass through unchanged, so
/// truncating twice is the same as truncating once.
pub fn truncate(s: &str, max: usize) -> String {
    let marker_len = TRUNCATION_MARKER.chars().count();
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some(_) if max < marker_len => s.chars().take(max).collect(),
        Some(_) => {
            let keep = max - marker_len;
            let byte_idx = s.char_indices().nth(keep).map_or(s.len(), |(i, _)| i);
            format!("{}{TRUNCATION_MARKER}", &s[..byte_idx])
        }
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

// ===================================================================
// Message types (serialized as the Discord JSON body)
// ===================================================================

/// Body posted to a webhook or the channel-messages endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscordMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    pub allowed_mentions: AllowedMentions,
}

/// Only explicitly listed users may be pinged; `@everyone`, `@here` and
/// role mentions inside hook text stay inert.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub color: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    /// RFC 3339 timestamp shown by Discord next to the footer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

impl EmbedField {
    /// A field with name and value truncated to Discord's limits. Empty
    /// values are replaced with a placeholder since Discord rejects them.
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>, inline: bool) -> Self {
        let value = value.as_ref();
        let value = if value.trim().is_empty() { "(empty)" } else { value };
        Self {
            name: truncate(name.as_ref(), FIELD_NAME_LIMIT),
            value: truncate(value, FIELD_VALUE_LIMIT),
            inline,
        }
    }
}

impl Embed {
    pub fn new(title: &str, color: u32) -> Self {
        Self {
            title: truncate(title, TITLE_LIMIT),
            color,
            ..Default::default()
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(truncate(text, DESCRIPTION_LIMIT));
        self
    }

    pub fn field(mut self, name: &str, value: &str, inline: bool) -> Self {
        if self.fields.len() < MAX_FIELDS {
            self.fields.push(EmbedField::new(name, value, inline));
        }
        self
    }

    pub fn footer(mut self, text: &str) -> Self {
        self.footer = Some(EmbedFooter {
            text: truncate(text, FOOTER_LIMIT),
        });
        self
    }

    /// Characters Discord counts toward the 6000 total.
    pub fn text_len(&self) -> usize {
        char_len(&self.title)
            + self.description.as_deref().map_or(0, char_len)
            + self
                .fields
                .iter()
                .map(|f| char_len(&f.name) + char_len(&f.value))
                .sum::<usize>()
            + self.footer.as_ref().map_or(0, |f| char_len(&f.text))
    }

    /// Cap the field count, then drop trailing fields and shorten the
    /// description until the embed fits the total limit.
    pub fn fit_total(mut self) -> Self {
        self.fields.truncate(MAX_FIELDS);
        while self.text_len() > EMBED_TOTAL_LIMIT && !self.fields.is_empty() {
            self.fields.pop();
        }
        let overflow = self.text_len().saturating_sub(EMBED_TOTAL_LIMIT);
        if overflow > 0 {
            if let Some(desc) = self.description.take() {
                let keep = char_len(&desc).saturating_sub(overflow);
                self.description = Some(truncate(&desc, keep));
            }
        }
        self
    }
}

impl DiscordMessage {
    pub fn new(embed: Embed) -> Self {
        Self {
            content: None,
            embeds: vec![embed.fit_total()],
            allowed_mentions: AllowedMentions::default(),
        }
    }

    pub fn with_content(mut self, content: &str) -> Self {
        self.content = Some(truncate(content, CONTENT_LIMIT));
        self
    }

    /// Allow exactly one user to be pinged by `content`.
    pub fn mentioning(mut self, user_id: &str) -> Self {
        self.allowed_mentions.users = vec![user_id.to_string()];
        self
    }

    /// Set the timestamp on every embed.
    pub fn stamp(mut self, timestamp: &str) -> Self {
        for embed in &mut self.embeds {
            embed.timestamp = Some(timestamp.to_string());
        }
        self
    }

    pub fn embed(&self) -> Option<&Embed> {
        self.embeds.first()
    }
}
