//! Event keys: `kaku-event::{type}::{action}::{uuid}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix of every event key the worker accepts.
pub const EVENT_PREFIX: &str = "kaku-event::";

/// Prefix of the ledger record written when an event fails.
pub const FAILED_PREFIX: &str = "kaku-failed::";

/// Key segment used for events without an action (gather).
const NO_ACTION: &str = "none";

/// Top-level event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Post,
    Mention,
    Gather,
}

impl EventType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Mention => "mention",
            Self::Gather => "gather",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event action. Gather events carry none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
    Undelete,
    Add,
}

impl Action {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Undelete => "undelete",
            Self::Add => "add",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique key an event payload is stored under and published as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey(String);

impl EventKey {
    /// Fresh key with a random v4 uuid.
    pub fn generate(kind: EventType, action: Option<Action>) -> Self {
        let action = action.map_or(NO_ACTION, Action::as_str);
        Self(format!("{EVENT_PREFIX}{kind}::{action}::{}", Uuid::new_v4()))
    }

    /// Accept a key received from the bus.
    ///
    /// Only the prefix is checked; producers other than this crate are free
    /// to pick their own suffix shape.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let rest = raw.strip_prefix(EVENT_PREFIX)?;
        (!rest.is_empty()).then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Ledger key of the failure record for this event.
    pub fn failed_key(&self) -> String {
        format!("{FAILED_PREFIX}{}", self.0)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
