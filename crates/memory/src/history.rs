//! The channel-keyed conversation history store.
//!
//! Each channel owns an ordered collection of [`ConversationMessage`]s,
//! stored newest-first internally and always read back in chronological
//! (oldest-first) order. Length is unbounded; the token budget bounds what
//! is actually *used* at prompt-build time, not what is stored.
//!
//! A channel entry is created on its first message and removed only by an
//! explicit clear or age-based cleanup. Appends are atomic single-step
//! writes under the lock, so no reader ever observes a partial entry.

use chrono::{DateTime, Duration, Utc};
use corvid_core::channel::ChannelId;
use corvid_core::message::ConversationMessage;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Per-channel message storage. Newest message sits at the front.
struct ChannelSlot {
    messages: VecDeque<ConversationMessage>,
    created_at: DateTime<Utc>,
}

impl ChannelSlot {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            created_at: Utc::now(),
        }
    }
}

/// Diagnostics for a single channel's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub message_count: usize,
    /// Rough token estimate across all stored content (4 chars ≈ 1 token).
    pub estimated_tokens: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Diagnostics across every channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub channel_count: usize,
    pub total_messages: usize,
}

/// Outcome of an age-based cleanup pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupReport {
    pub messages_removed: usize,
    pub channels_removed: usize,
}

/// The channel-keyed history store.
///
/// Explicitly owned and injected: constructed once by the embedding
/// application and handed by reference into each component that reads or
/// writes history.
#[derive(Clone)]
pub struct ChannelHistoryStore {
    channels: Arc<RwLock<HashMap<ChannelId, ChannelSlot>>>,
}

impl ChannelHistoryStore {
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Append a message to its channel's history. Creates the channel entry
    /// on first use.
    pub async fn append(&self, message: ConversationMessage) {
        let mut channels = self.channels.write().await;
        let slot = channels
            .entry(message.channel_id.clone())
            .or_insert_with(ChannelSlot::new);
        slot.messages.push_front(message);
    }

    /// Read a channel's full history in chronological (oldest-first) order.
    pub async fn all(&self, channel: &ChannelId) -> Vec<ConversationMessage> {
        let channels = self.channels.read().await;
        match channels.get(channel) {
            Some(slot) => slot.messages.iter().rev().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Read the most recent `limit` messages in chronological order.
    pub async fn recent(&self, channel: &ChannelId, limit: usize) -> Vec<ConversationMessage> {
        let channels = self.channels.read().await;
        match channels.get(channel) {
            Some(slot) => {
                let mut out: Vec<ConversationMessage> =
                    slot.messages.iter().take(limit).cloned().collect();
                out.reverse();
                out
            }
            None => Vec::new(),
        }
    }

    /// Count messages newer than `since` (used to derive activity levels).
    pub async fn count_since(&self, channel: &ChannelId, since: DateTime<Utc>) -> usize {
        let channels = self.channels.read().await;
        match channels.get(channel) {
            Some(slot) => slot
                .messages
                .iter()
                .take_while(|m| m.timestamp >= since)
                .count(),
            None => 0,
        }
    }

    /// Drop a channel's history entirely. Returns the number of messages
    /// removed.
    pub async fn clear(&self, channel: &ChannelId) -> usize {
        let mut channels = self.channels.write().await;
        match channels.remove(channel) {
            Some(slot) => {
                debug!(channel = %channel, removed = slot.messages.len(), "Cleared channel history");
                slot.messages.len()
            }
            None => 0,
        }
    }

    /// Drop every channel's history. Returns the total messages removed.
    pub async fn clear_all(&self) -> usize {
        let mut channels = self.channels.write().await;
        let total: usize = channels.values().map(|s| s.messages.len()).sum();
        channels.clear();
        total
    }

    /// Remove messages older than `max_age`; channels left empty (and idle
    /// since before the cutoff) are removed entirely.
    pub async fn cleanup_older_than(&self, max_age: Duration) -> CleanupReport {
        let cutoff = Utc::now() - max_age;
        let mut channels = self.channels.write().await;
        let mut report = CleanupReport::default();

        channels.retain(|channel, slot| {
            let before = slot.messages.len();
            slot.messages.retain(|m| m.timestamp >= cutoff);
            report.messages_removed += before - slot.messages.len();

            let keep = !slot.messages.is_empty() || slot.created_at >= cutoff;
            if !keep {
                debug!(channel = %channel, "Removed idle channel during cleanup");
                report.channels_removed += 1;
            }
            keep
        });

        report
    }

    /// Diagnostics for one channel, if it exists.
    pub async fn channel_stats(&self, channel: &ChannelId) -> Option<ChannelStats> {
        let channels = self.channels.read().await;
        channels.get(channel).map(|slot| ChannelStats {
            message_count: slot.messages.len(),
            estimated_tokens: slot
                .messages
                .iter()
                .map(|m| m.content.len() / 4)
                .sum(),
            // Newest-first storage: back is oldest, front is newest.
            oldest: slot.messages.back().map(|m| m.timestamp),
            newest: slot.messages.front().map(|m| m.timestamp),
        })
    }

    /// Diagnostics across all channels.
    pub async fn global_stats(&self) -> GlobalStats {
        let channels = self.channels.read().await;
        GlobalStats {
            channel_count: channels.len(),
            total_messages: channels.values().map(|s| s.messages.len()).sum(),
        }
    }
}

impl Default for ChannelHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chan(id: &str) -> ChannelId {
        ChannelId(id.into())
    }

    fn msg(channel: &str, content: &str) -> ConversationMessage {
        ConversationMessage::user("Alice", content, chan(channel))
    }

    #[tokio::test]
    async fn read_is_chronological_regardless_of_storage_order() {
        let store = ChannelHistoryStore::new();
        store.append(msg("c1", "first")).await;
        store.append(msg("c1", "second")).await;
        store.append(msg("c1", "third")).await;

        let all = store.all(&chan("c1")).await;
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn recent_returns_newest_in_chronological_order() {
        let store = ChannelHistoryStore::new();
        for i in 0..10 {
            store.append(msg("c1", &format!("message {i}"))).await;
        }

        let recent = store.recent(&chan("c1"), 3).await;
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 7", "message 8", "message 9"]);
    }

    #[tokio::test]
    async fn recent_with_limit_beyond_length() {
        let store = ChannelHistoryStore::new();
        store.append(msg("c1", "only")).await;
        assert_eq!(store.recent(&chan("c1"), 50).await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_channel_reads_empty() {
        let store = ChannelHistoryStore::new();
        assert!(store.all(&chan("nope")).await.is_empty());
        assert!(store.recent(&chan("nope"), 5).await.is_empty());
        assert!(store.channel_stats(&chan("nope")).await.is_none());
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let store = ChannelHistoryStore::new();
        store.append(msg("c1", "in c1")).await;
        store.append(msg("c2", "in c2")).await;

        assert_eq!(store.all(&chan("c1")).await.len(), 1);
        assert_eq!(store.all(&chan("c2")).await.len(), 1);
        assert_eq!(store.all(&chan("c1")).await[0].content, "in c1");
    }

    #[tokio::test]
    async fn clear_removes_channel() {
        let store = ChannelHistoryStore::new();
        store.append(msg("c1", "a")).await;
        store.append(msg("c1", "b")).await;

        assert_eq!(store.clear(&chan("c1")).await, 2);
        assert!(store.all(&chan("c1")).await.is_empty());
        assert_eq!(store.clear(&chan("c1")).await, 0);
    }

    #[tokio::test]
    async fn clear_all_reports_total() {
        let store = ChannelHistoryStore::new();
        store.append(msg("c1", "a")).await;
        store.append(msg("c2", "b")).await;
        store.append(msg("c2", "c")).await;

        assert_eq!(store.clear_all().await, 3);
        assert_eq!(store.global_stats().await.channel_count, 0);
    }

    #[tokio::test]
    async fn cleanup_removes_old_messages() {
        let store = ChannelHistoryStore::new();
        let mut old = msg("c1", "ancient");
        old.timestamp = Utc::now() - Duration::hours(48);
        store.append(old).await;
        store.append(msg("c1", "fresh")).await;

        let report = store.cleanup_older_than(Duration::hours(24)).await;
        assert_eq!(report.messages_removed, 1);
        assert_eq!(report.channels_removed, 0);

        let remaining = store.all(&chan("c1")).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].content, "fresh");
    }

    #[tokio::test]
    async fn cleanup_removes_empty_idle_channels() {
        let store = ChannelHistoryStore::new();
        let mut old = msg("c1", "ancient");
        old.timestamp = Utc::now() - Duration::hours(48);
        store.append(old).await;

        // Force the slot itself to look idle
        {
            let mut channels = store.channels.write().await;
            channels.get_mut(&chan("c1")).unwrap().created_at =
                Utc::now() - Duration::hours(48);
        }

        let report = store.cleanup_older_than(Duration::hours(24)).await;
        assert_eq!(report.messages_removed, 1);
        assert_eq!(report.channels_removed, 1);
        assert_eq!(store.global_stats().await.channel_count, 0);
    }

    #[tokio::test]
    async fn stats_track_counts_and_timestamps() {
        let store = ChannelHistoryStore::new();
        store.append(msg("c1", "12345678")).await; // ~2 tokens
        store.append(msg("c1", "1234")).await; // ~1 token

        let stats = store.channel_stats(&chan("c1")).await.unwrap();
        assert_eq!(stats.message_count, 2);
        assert_eq!(stats.estimated_tokens, 3);
        assert!(stats.oldest.unwrap() <= stats.newest.unwrap());

        let global = store.global_stats().await;
        assert_eq!(global.channel_count, 1);
        assert_eq!(global.total_messages, 2);
    }

    #[tokio::test]
    async fn count_since_uses_timestamps() {
        let store = ChannelHistoryStore::new();
        let mut old = msg("c1", "old");
        old.timestamp = Utc::now() - Duration::minutes(30);
        store.append(old).await;
        store.append(msg("c1", "new a")).await;
        store.append(msg("c1", "new b")).await;

        let since = Utc::now() - Duration::minutes(5);
        assert_eq!(store.count_since(&chan("c1"), since).await, 2);
    }
}
