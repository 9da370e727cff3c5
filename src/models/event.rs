use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_EVENT: &str = "DEFAULT";
pub const DEMO_PREFIX: &str = "DEMO_";

/// Partition key for the photos of one live event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        EventId(id.into())
    }

    /// Empty or missing parameters fall back to `DEFAULT`.
    pub fn from_param(param: Option<&str>) -> Self {
        match param.map(str::trim) {
            Some(id) if !id.is_empty() => EventId(id.to_string()),
            _ => EventId::default(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_EVENT
    }

    pub fn is_demo(&self) -> bool {
        self.0.starts_with(DEMO_PREFIX)
    }
}

impl Default for EventId {
    fn default() -> Self {
        EventId(DEFAULT_EVENT.to_string())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
