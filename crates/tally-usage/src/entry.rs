//! Typed view over one decoded log line.
//!
//! Session logs are written by another program and their shape drifts between
//! versions, so nothing here assumes structure. [`LogEntry::from_value`] is a
//! total function: every key it cannot read as the expected type becomes
//! `None`, and a line that is valid JSON but not an object simply yields an
//! entry whose accessors all return `None`.

use chrono::{DateTime, Utc};
use serde_json::Value;

/// Token counts carried by one log entry's `message.usage` object.
///
/// Missing or non-integer fields read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageRecord {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
    /// `cache_creation.ephemeral_5m_input_tokens`
    pub ephemeral_5m_input_tokens: u64,
    /// `cache_creation.ephemeral_1h_input_tokens`
    pub ephemeral_1h_input_tokens: u64,
}

impl UsageRecord {
    /// Read a usage record from a `usage` value.
    ///
    /// Returns `None` unless the value is a non-empty object; an empty
    /// `usage: {}` carries nothing and is not counted as a message.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.is_empty() {
            return None;
        }

        let cache_creation = obj.get("cache_creation");
        let ephemeral = |key: &str| cache_creation.map_or(0, |c| token_field(c, key));

        Some(Self {
            input_tokens: token_field(value, "input_tokens"),
            output_tokens: token_field(value, "output_tokens"),
            cache_creation_input_tokens: token_field(value, "cache_creation_input_tokens"),
            cache_read_input_tokens: token_field(value, "cache_read_input_tokens"),
            ephemeral_5m_input_tokens: ephemeral("ephemeral_5m_input_tokens"),
            ephemeral_1h_input_tokens: ephemeral("ephemeral_1h_input_tokens"),
        })
    }

    /// True when every token field is zero.
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// The `message` object of a log entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub model: Option<String>,
    pub usage: Option<UsageRecord>,
}

impl Message {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_object()?;
        Some(Self {
            model: string_field(value, "model"),
            usage: value.get("usage").and_then(UsageRecord::from_value),
        })
    }
}

/// One structured record from a session log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEntry {
    request_id: Option<String>,
    agent_id: Option<String>,
    slug: Option<String>,
    session_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    message: Option<Message>,
}

impl LogEntry {
    /// Build an entry from any JSON value. Never fails.
    pub fn from_value(value: &Value) -> Self {
        Self {
            request_id: string_field(value, "requestId"),
            agent_id: string_field(value, "agentId"),
            slug: string_field(value, "slug"),
            session_id: string_field(value, "sessionId"),
            timestamp: value
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|ts| ts.with_timezone(&Utc)),
            message: value.get("message").and_then(Message::from_value),
        }
    }

    /// Decode one JSON line.
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(line)?;
        Ok(Self::from_value(&value))
    }

    /// Usage record, present only when `message` is an object with a usable `usage`.
    pub fn usage(&self) -> Option<&UsageRecord> {
        self.message.as_ref()?.usage.as_ref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id.as_deref()
    }

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// `message.model`
    pub fn model(&self) -> Option<&str> {
        self.message.as_ref()?.model.as_deref()
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

/// Read a non-empty string field.
fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Read a non-negative integer token count, defaulting to zero.
fn token_field(value: &Value, key: &str) -> u64 {
    value.get(key).and_then(Value::as_u64).unwrap_or(0)
}
