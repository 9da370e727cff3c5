use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::event::EventId;

// Same unreserved set as JavaScript's encodeURIComponent.
const CAPTION: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const EVENT_PREFIX: &str = "event_";
const PENDING_PREFIX: &str = "pending_";
const APPROVED_PREFIX: &str = "approved_";
const MESSAGE_PREFIX: &str = "msg:";

/// A stored tag, typed.
///
/// The store only knows plain strings; this is the single place where the
/// workflow state is encoded into and decoded from them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Event(EventId),
    Pending(EventId),
    Approved(EventId),
    /// Caption attached at upload time, kept decoded.
    Message(String),
    LegacyPending,
    LegacyApproved,
    Moderated,
    Other(String),
}

impl Tag {
    pub fn parse(raw: &str) -> Tag {
        match raw {
            "pending" => return Tag::LegacyPending,
            "approved" => return Tag::LegacyApproved,
            "moderated" => return Tag::Moderated,
            _ => {}
        }

        if let Some(encoded) = raw.strip_prefix(MESSAGE_PREFIX) {
            let text = percent_decode_str(encoded).decode_utf8_lossy().into_owned();
            return Tag::Message(text);
        }

        if let Some(id) = scoped(raw, EVENT_PREFIX) {
            Tag::Event(id)
        } else if let Some(id) = scoped(raw, PENDING_PREFIX) {
            Tag::Pending(id)
        } else if let Some(id) = scoped(raw, APPROVED_PREFIX) {
            Tag::Approved(id)
        } else {
            Tag::Other(raw.to_string())
        }
    }

    /// Demo event this tag points at, if it follows the `DEMO_` convention
    /// bare or wrapped in `pending_`/`approved_`.
    pub fn demo_event(raw: &str) -> Option<EventId> {
        let id = raw
            .strip_prefix(APPROVED_PREFIX)
            .or_else(|| raw.strip_prefix(PENDING_PREFIX))
            .unwrap_or(raw);

        Some(EventId::new(id)).filter(EventId::is_demo)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Event(id) => write!(f, "{EVENT_PREFIX}{id}"),
            Tag::Pending(id) => write!(f, "{PENDING_PREFIX}{id}"),
            Tag::Approved(id) => write!(f, "{APPROVED_PREFIX}{id}"),
            Tag::Message(text) => write!(f, "{MESSAGE_PREFIX}{}", utf8_percent_encode(text, CAPTION)),
            Tag::LegacyPending => f.write_str("pending"),
            Tag::LegacyApproved => f.write_str("approved"),
            Tag::Moderated => f.write_str("moderated"),
            Tag::Other(raw) => f.write_str(raw),
        }
    }
}

fn scoped(raw: &str, prefix: &str) -> Option<EventId> {
    raw.strip_prefix(prefix)
        .filter(|id| !id.is_empty())
        .map(EventId::new)
}

/// Event a photo belongs to, from its `event_<id>` tag.
pub fn event_of(tags: &[String]) -> Option<EventId> {
    tags.iter().find_map(|raw| match Tag::parse(raw) {
        Tag::Event(id) => Some(id),
        _ => None,
    })
}

pub fn message_of(tags: &[String]) -> Option<String> {
    tags.iter().find_map(|raw| match Tag::parse(raw) {
        Tag::Message(text) => Some(text),
        _ => None,
    })
}

/// Tags a fresh upload starts with.
pub fn initial_tags(event_id: &EventId, message: Option<&str>) -> Vec<String> {
    let mut tags = vec![
        Tag::Event(event_id.clone()).to_string(),
        Tag::Pending(event_id.clone()).to_string(),
    ];

    if let Some(text) = message.map(str::trim).filter(|text| !text.is_empty()) {
        tags.push(Tag::Message(text.to_string()).to_string());
    }

    tags
}
