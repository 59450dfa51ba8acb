//! Conversation message domain types.
//!
//! These are the core value objects that flow through the system:
//! a platform message arrives → it becomes a ConversationMessage in the
//! channel's history → the decision engine classifies it → the router acts.
//!
//! Messages are immutable after creation. They leave the history only via an
//! explicit clear or age-based cleanup.

use crate::channel::ChannelId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A pre-computed text summary of an attached image, supplied by the
/// vision collaborator before the message reaches the decision engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnalysis {
    /// The text summary of the image content.
    pub analysis: String,
}

/// One platform message as originally received.
///
/// When several rapid messages from one author are merged into a single
/// logical turn, each original survives here so the router can pick a
/// reply anchor later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message ID, used as the anchor for threaded replies.
    pub message_id: String,

    /// Display name of the sender.
    pub author: String,

    /// The text content.
    pub content: String,

    /// When the platform delivered it.
    pub timestamp: DateTime<Utc>,

    /// Whether the message carried an attachment (image, file, etc.).
    #[serde(default)]
    pub has_attachment: bool,

    /// Vision summaries for attached images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_analysis: Vec<ImageAnalysis>,
}

impl InboundMessage {
    /// Create a plain text inbound message.
    pub fn new(
        message_id: impl Into<String>,
        author: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            author: author.into(),
            content: content.into(),
            timestamp: Utc::now(),
            has_attachment: false,
            image_analysis: Vec::new(),
        }
    }

    /// Attach vision summaries (also marks the message as carrying an attachment).
    pub fn with_images(mut self, analyses: Vec<ImageAnalysis>) -> Self {
        self.has_attachment = true;
        self.image_analysis = analyses;
        self
    }
}

/// One turn in a channel's conversation memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    /// Unique message ID.
    pub id: String,

    /// Display name of the author.
    pub author: String,

    /// The text content. For a batched turn this is the merged content of
    /// all constituent messages.
    pub content: String,

    /// Timestamp of creation (for batches: the last constituent's arrival).
    pub timestamp: DateTime<Utc>,

    /// Whether this turn was produced by the bot itself.
    pub is_bot: bool,

    /// The channel this turn belongs to.
    pub channel_id: ChannelId,

    /// Vision summaries for attached images.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_analysis: Vec<ImageAnalysis>,

    /// The original platform messages when several were merged into this
    /// logical turn. Empty for ordinary single messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub original_messages: Vec<InboundMessage>,
}

impl ConversationMessage {
    /// Create a message authored by a user.
    pub fn user(
        author: impl Into<String>,
        content: impl Into<String>,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            content: content.into(),
            timestamp: Utc::now(),
            is_bot: false,
            channel_id,
            image_analysis: Vec::new(),
            original_messages: Vec::new(),
        }
    }

    /// Create a message authored by the bot (recorded after a send).
    pub fn bot(
        author: impl Into<String>,
        content: impl Into<String>,
        channel_id: ChannelId,
    ) -> Self {
        Self {
            is_bot: true,
            ..Self::user(author, content, channel_id)
        }
    }

    /// Merge several rapid messages from one author into a single logical
    /// turn. Contents are joined with newlines; image summaries are pooled;
    /// the originals survive for reply-target selection.
    ///
    /// Panics in debug builds if `originals` is empty; a batch always has
    /// at least one constituent.
    pub fn batched(
        author: impl Into<String>,
        originals: Vec<InboundMessage>,
        channel_id: ChannelId,
    ) -> Self {
        debug_assert!(!originals.is_empty());
        let content = originals
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let image_analysis: Vec<ImageAnalysis> = originals
            .iter()
            .flat_map(|m| m.image_analysis.iter().cloned())
            .collect();
        let timestamp = originals
            .last()
            .map(|m| m.timestamp)
            .unwrap_or_else(Utc::now);

        Self {
            id: Uuid::new_v4().to_string(),
            author: author.into(),
            content,
            timestamp,
            is_bot: false,
            channel_id,
            image_analysis,
            original_messages: originals,
        }
    }

    /// Attach vision summaries.
    pub fn with_images(mut self, analyses: Vec<ImageAnalysis>) -> Self {
        self.image_analysis = analyses;
        self
    }

    /// Whether this turn represents a merged batch of messages.
    pub fn is_batched(&self) -> bool {
        self.original_messages.len() > 1
    }
}
