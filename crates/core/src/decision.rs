//! The Decision tagged union — the typed outcome of message classification.
//!
//! The model speaks a line-oriented wire format at the boundary; it is parsed
//! into these types exactly once, so everything downstream is pattern
//! matching rather than string inspection.

use serde::{Deserialize, Serialize};

/// What the bot decided to do about an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Send a normal channel-level message.
    Respond,
    /// Send a threaded reply anchored to a specific message.
    Reply,
    /// Attach an emoji reaction to the triggering message.
    React,
    /// Do nothing (recorded for observability).
    Ignore,
    /// Change the bot's presence/status.
    StatusChange,
}

impl Action {
    /// Parse the wire-format action token. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "respond" => Some(Self::Respond),
            "reply" => Some(Self::Reply),
            "react" => Some(Self::React),
            "ignore" => Some(Self::Ignore),
            "status_change" => Some(Self::StatusChange),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Respond => "respond",
            Self::Reply => "reply",
            Self::React => "react",
            Self::Ignore => "ignore",
            Self::StatusChange => "status_change",
        }
    }
}

/// Bot presence states, mapped to the platform by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    Online,
    Away,
    DoNotDisturb,
    Invisible,
}

impl Presence {
    /// Parse the wire-format status token. Case-insensitive; accepts the
    /// common "dnd" shorthand.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "online" => Some(Self::Online),
            "away" => Some(Self::Away),
            "dnd" | "do_not_disturb" => Some(Self::DoNotDisturb),
            "invisible" => Some(Self::Invisible),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::DoNotDisturb => "dnd",
            Self::Invisible => "invisible",
        }
    }
}

/// The structured outcome of the classification step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Which action to take.
    pub action: Action,

    /// Model confidence in [0, 1]. Clamped on construction.
    pub confidence: f32,

    /// Free-text rationale, kept for observability only.
    pub reasoning: String,

    /// The emoji to react with. Present and non-empty iff `action == React`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,

    /// The target presence. Present iff `action == StatusChange`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Presence>,
}

impl Decision {
    /// Construct a decision with confidence clamped into [0, 1].
    pub fn new(action: Action, confidence: f32, reasoning: impl Into<String>) -> Self {
        Self {
            action,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            emoji: None,
            status: None,
        }
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = Some(emoji.into());
        self
    }

    pub fn with_status(mut self, status: Presence) -> Self {
        self.status = Some(status);
        self
    }

    /// The safe default applied when classification fails: ignore with zero
    /// confidence.
    pub fn fallback_ignore(reason: impl Into<String>) -> Self {
        Self::new(Action::Ignore, 0.0, reason)
    }

    /// Check the per-action field invariants: React carries a non-empty
    /// emoji, StatusChange carries a status.
    pub fn fields_valid(&self) -> bool {
        match self.action {
            Action::React => self.emoji.as_deref().is_some_and(|e| !e.is_empty()),
            Action::StatusChange => self.status.is_some(),
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parse_roundtrip() {
        for action in [
            Action::Respond,
            Action::Reply,
            Action::React,
            Action::Ignore,
            Action::StatusChange,
        ] {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("RESPOND"), Some(Action::Respond));
        assert_eq!(Action::parse("shout"), None);
    }

    #[test]
    fn presence_parse_accepts_shorthand() {
        assert_eq!(Presence::parse("dnd"), Some(Presence::DoNotDisturb));
        assert_eq!(
            Presence::parse("do_not_disturb"),
            Some(Presence::DoNotDisturb)
        );
        assert_eq!(Presence::parse("Online"), Some(Presence::Online));
        assert_eq!(Presence::parse("busy"), None);
    }

    #[test]
    fn confidence_clamped() {
        assert_eq!(Decision::new(Action::Ignore, 1.7, "r").confidence, 1.0);
        assert_eq!(Decision::new(Action::Ignore, -0.3, "r").confidence, 0.0);
    }

    #[test]
    fn react_requires_emoji() {
        let bare = Decision::new(Action::React, 0.9, "funny message");
        assert!(!bare.fields_valid());

        let filled = bare.with_emoji("😂");
        assert!(filled.fields_valid());

        let empty = Decision::new(Action::React, 0.9, "r").with_emoji("");
        assert!(!empty.fields_valid());
    }

    #[test]
    fn status_change_requires_status() {
        let bare = Decision::new(Action::StatusChange, 0.8, "going quiet");
        assert!(!bare.fields_valid());
        assert!(bare.with_status(Presence::Away).fields_valid());
    }

    #[test]
    fn fallback_is_ignore_with_zero_confidence() {
        let d = Decision::fallback_ignore("parse failed");
        assert_eq!(d.action, Action::Ignore);
        assert_eq!(d.confidence, 0.0);
        assert!(d.fields_valid());
    }
}
