//! Channel context and the chat-platform gateway trait.
//!
//! A channel is an independent conversation surface (a guild channel or a
//! DM) with its own history and activity state. The `ChatGateway` trait is
//! the seam to the platform client; connection and reconnection live on the
//! other side of it.

use crate::decision::Presence;
use crate::error::GatewayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub String);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a channel lives: inside a guild (server) or a direct message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelScope {
    /// A one-on-one direct message.
    DirectMessage,
    /// A channel within a named guild.
    Guild { id: String, name: String },
}

impl ChannelScope {
    /// Display label used in prompts ("DM" or the guild name).
    pub fn label(&self) -> &str {
        match self {
            Self::DirectMessage => "DM",
            Self::Guild { name, .. } => name,
        }
    }
}

/// How busy a channel has been recently.
///
/// Derived from the number of messages in the last five minutes; fed into
/// decision prompts so the model can modulate how eagerly it joins in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Quiet,
    Normal,
    Active,
    VeryActive,
}

impl ActivityLevel {
    /// Derive the level from the message count over the last five minutes.
    pub fn from_recent_count(messages_last_5_min: usize) -> Self {
        match messages_last_5_min {
            0..=1 => Self::Quiet,
            2..=5 => Self::Normal,
            6..=15 => Self::Active,
            _ => Self::VeryActive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Normal => "normal",
            Self::Active => "active",
            Self::VeryActive => "very_active",
        }
    }
}

/// Snapshot of a channel at decision time. Ephemeral: recomputed for every
/// decision, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelContext {
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub scope: ChannelScope,
    pub activity: ActivityLevel,

    /// When the bot last acted in this channel (any action, not just sends).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action_at: Option<DateTime<Utc>>,
}

impl ChannelContext {
    /// Minutes since the bot last acted here, if it ever has.
    pub fn minutes_since_last_action(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_action_at
            .map(|t| (now - t).num_minutes().max(0))
    }
}

/// What the bot is allowed to do in a channel.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ChannelPermissions {
    pub send_messages: bool,
    pub add_reactions: bool,
    pub manage_presence: bool,
}

impl ChannelPermissions {
    /// Full permissions, the common case for a bot in its own guilds.
    pub fn all() -> Self {
        Self {
            send_messages: true,
            add_reactions: true,
            manage_presence: true,
        }
    }
}

/// The seam to the chat platform.
///
/// Implementations handle connection lifecycle, rate limiting, and platform
/// formatting. The core only ever performs these five effects.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Human-readable platform name (e.g. "discord").
    fn name(&self) -> &str;

    /// Send a message into a channel.
    async fn send_message(
        &self,
        channel: &ChannelId,
        content: &str,
    ) -> std::result::Result<(), GatewayError>;

    /// Send a threaded reply anchored to a specific platform message.
    async fn send_reply(
        &self,
        channel: &ChannelId,
        content: &str,
        reply_to: &str,
    ) -> std::result::Result<(), GatewayError>;

    /// Attach an emoji reaction to a platform message.
    async fn add_reaction(
        &self,
        channel: &ChannelId,
        message_id: &str,
        emoji: &str,
    ) -> std::result::Result<(), GatewayError>;

    /// Set the bot's presence/status.
    async fn set_presence(&self, status: Presence) -> std::result::Result<(), GatewayError>;

    /// Show a typing indicator (if the platform supports it).
    async fn send_typing(&self, _channel: &ChannelId) -> std::result::Result<(), GatewayError> {
        Ok(()) // No-op default
    }

    /// The bot's permissions in a channel.
    fn permissions(&self, channel: &ChannelId) -> ChannelPermissions;
}
