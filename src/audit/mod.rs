//! Audit event model.
//!
//! # Data Flow
//! ```text
//! store / allowlist / watch / pipeline
//!     → AuditEvent (built here)
//!     → EventSink::record (sink.rs)
//!     → JSON lines file, tracing target, or memory (tests)
//! ```
//!
//! # Design Decisions
//! - Events are plain values; the core never knows where they end up
//! - Sinks are write-only and must not fail the caller
//! - System-originated events use the `SYSTEM` client identity

pub mod sink;

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

pub use sink::{EventSink, FanoutSink, JsonLinesSink, MemorySink, TracingSink};

/// Client identity recorded for events that no request caused.
pub const SYSTEM_CLIENT: &str = "SYSTEM";

/// Category of an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Auth,
    ConfigAccess,
    ConfigChange,
    IpFilterChange,
    ConfigLoad,
    IpFilterLoad,
    Request,
    IpFilter,
    RateLimit,
    ConfigWatch,
    IpFilterWatch,
}

/// Outcome recorded on an audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    Failed,
    Denied,
    Allowed,
    Added,
    Updated,
    Removed,
    Detected,
    Started,
    Stopped,
    Error,
}

/// A single audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    #[serde(serialize_with = "rfc3339")]
    pub timestamp: DateTime<Utc>,
    pub event_type: EventType,
    pub client_ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_key: Option<String>,
    pub status: Status,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

fn rfc3339<S: serde::Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

impl AuditEvent {
    /// Start an event stamped with the current time.
    pub fn new(event_type: EventType, client_ip: impl Into<String>, status: Status) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            client_ip: client_ip.into(),
            user_id: None,
            product: None,
            environment: None,
            config_key: None,
            status,
            details: BTreeMap::new(),
        }
    }

    /// Event raised by the server itself rather than a client.
    pub fn system(event_type: EventType, status: Status) -> Self {
        Self::new(event_type, SYSTEM_CLIENT, status)
    }

    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.config_key = Some(key.into());
        self
    }

    /// Attach a free-form detail.
    pub fn detail(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.details.insert(name.to_string(), value.into());
        self
    }
}
