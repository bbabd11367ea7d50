//! Submission records shared between the flow and the moderation desk.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::domain::{ChatId, MessageRef, Sender};

/// Registry key. Derived from the id of the message that carried the ad.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub i64);

impl SubmissionId {
    pub fn from_message(msg: MessageRef) -> Self {
        SubmissionId(i64::from(msg.message_id.0))
    }

    /// Strict decimal parse; anything else is a malformed payload.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse::<i64>().ok().map(SubmissionId)
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdType {
    Normal,
    Featured,
}

impl AdType {
    pub const ALL: [AdType; 2] = [AdType::Normal, AdType::Featured];

    /// Tag used in callback payloads.
    pub fn tag(self) -> &'static str {
        match self {
            AdType::Normal => "normal",
            AdType::Featured => "featured",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        AdType::ALL.into_iter().find(|t| t.tag() == tag)
    }

    pub fn label(self) -> &'static str {
        match self {
            AdType::Normal => "Normal ad",
            AdType::Featured => "Featured ad",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdContent {
    Text(String),
    Photo {
        file_id: String,
        caption: Option<String>,
    },
}

impl AdContent {
    /// The user-authored text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            AdContent::Text(t) => Some(t),
            AdContent::Photo { caption, .. } => caption.as_deref(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionStatus {
    /// Content received, waiting for the payment receipt.
    PendingReceipt,
    /// Receipt received, waiting for a moderator.
    AwaitingModeration,
    /// A moderator approved and publication is in flight.
    Publishing,
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub id: SubmissionId,
    pub ad_type: AdType,
    pub content: AdContent,
    pub submitter: Sender,
    pub submitter_chat: ChatId,
    pub content_message: MessageRef,
    pub receipt_message: Option<MessageRef>,
    pub status: SubmissionStatus,
    pub created_at: Instant,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(
        content_message: MessageRef,
        ad_type: AdType,
        content: AdContent,
        submitter: Sender,
    ) -> Self {
        Self {
            id: SubmissionId::from_message(content_message),
            ad_type,
            content,
            submitter,
            submitter_chat: content_message.chat_id,
            content_message,
            receipt_message: None,
            status: SubmissionStatus::PendingReceipt,
            created_at: Instant::now(),
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_id_parse_is_strict() {
        assert_eq!(SubmissionId::parse("123"), Some(SubmissionId(123)));
        assert_eq!(SubmissionId::parse(" 7 "), Some(SubmissionId(7)));
        assert_eq!(SubmissionId::parse(""), None);
        assert_eq!(SubmissionId::parse("-5"), None);
        assert_eq!(SubmissionId::parse("12a"), None);
        assert_eq!(SubmissionId::parse("99999999999999999999999"), None);
    }

    #[test]
    fn ad_type_tags_roundtrip() {
        for t in AdType::ALL {
            assert_eq!(AdType::from_tag(t.tag()), Some(t));
        }
        assert_eq!(AdType::from_tag("premium"), None);
    }
}
