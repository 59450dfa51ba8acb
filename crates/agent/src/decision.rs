//! Decision engine — classifies an incoming message (or merged batch) into
//! a typed [`Decision`].
//!
//! The engine renders a decision prompt, submits it through the scheduler
//! under the `decision` request kind, and parses the model's line-oriented
//! reply at the boundary. Parse problems are values, not panics: callers
//! apply [`Decision::fallback_ignore`] and the loop keeps running.

use crate::emoji;
use corvid_config::BotSettings;
use corvid_core::channel::ChannelContext;
use corvid_core::decision::{Action, Decision, Presence};
use corvid_core::error::DecisionError;
use corvid_core::event::{DomainEvent, EventBus};
use corvid_core::message::ConversationMessage;
use corvid_core::persona::Persona;
use corvid_core::provider::{CompletionRequest, ModelClient};
use corvid_scheduler::{kinds, RequestScheduler};
use std::sync::Arc;
use tracing::{debug, info};

/// Upper bound on decision replies; the wire format is five short lines.
const DECISION_MAX_TOKENS: u32 = 256;

/// How many recent turns the decision prompt previews.
const PREVIEW_TURNS: usize = 3;

/// Classifies messages into decisions.
pub struct DecisionEngine {
    scheduler: RequestScheduler,
    model: Arc<dyn ModelClient>,
    settings: Arc<BotSettings>,
    persona: Persona,
    events: Arc<EventBus>,
}

impl DecisionEngine {
    pub fn new(
        scheduler: RequestScheduler,
        model: Arc<dyn ModelClient>,
        settings: Arc<BotSettings>,
        events: Arc<EventBus>,
    ) -> Self {
        let persona = settings.persona.to_persona();
        Self {
            scheduler,
            model,
            settings,
            persona,
            events,
        }
    }

    /// Classify one logical message. `recent` is the channel's recent
    /// history, chronological, already trimmed to a small preview.
    pub async fn decide(
        &self,
        message: &ConversationMessage,
        ctx: &ChannelContext,
        recent: &[ConversationMessage],
    ) -> Result<Decision, DecisionError> {
        let prompt = if message.is_batched() {
            self.render_batch_prompt(message, ctx, recent)
        } else {
            self.render_single_prompt(message, ctx, recent)
        };

        debug!(channel = %ctx.channel_id, batched = message.is_batched(), "Submitting decision request");

        let request = CompletionRequest {
            model: self.settings.model.clone(),
            prompt,
            params: self.settings.sampling(),
            max_tokens: Some(DECISION_MAX_TOKENS),
        };
        let model = self.model.clone();
        let raw = self
            .scheduler
            .submit(kinds::DECISION, async move {
                model.complete(request).await.map(|r| r.text)
            })
            .await
            .map_err(DecisionError::from)?;

        let decision = parse_decision(&raw, &message.content)?;

        info!(
            channel = %ctx.channel_id,
            action = decision.action.as_str(),
            confidence = decision.confidence,
            "Decision made"
        );
        self.events.publish(DomainEvent::DecisionMade {
            channel: ctx.channel_id.to_string(),
            action: decision.action.as_str().into(),
            confidence: decision.confidence,
            reasoning: decision.reasoning.clone(),
            timestamp: chrono::Utc::now(),
        });

        Ok(decision)
    }

    // ── Prompt rendering ──────────────────────────────────────────────────

    fn render_header(&self, ctx: &ChannelContext) -> String {
        let mut out = format!(
            "You are {}, deciding whether to engage with a chat message.\n\n\
             Channel: #{} ({}) — activity: {}\n",
            self.persona.name,
            ctx.channel_name,
            ctx.scope.label(),
            ctx.activity.as_str(),
        );
        match ctx.minutes_since_last_action(chrono::Utc::now()) {
            Some(minutes) => {
                out.push_str(&format!("You last acted here {minutes} minutes ago.\n"));
            }
            None => out.push_str("You have not acted in this channel recently.\n"),
        }
        out
    }

    fn render_preview(recent: &[ConversationMessage]) -> String {
        if recent.is_empty() {
            return String::new();
        }
        let mut out = String::from("\nRecent conversation:\n");
        let start = recent.len().saturating_sub(PREVIEW_TURNS);
        for message in &recent[start..] {
            out.push_str(&format!("{}: {}\n", message.author, message.content));
        }
        out
    }

    fn render_images(message: &ConversationMessage) -> String {
        message
            .image_analysis
            .iter()
            .map(|img| format!("\n[Image: {}]", img.analysis))
            .collect()
    }

    fn render_format_instructions(batched: bool) -> String {
        let mut out = String::from(
            "\nDecide how to engage. Reply with exactly these lines:\n\
             ACTION: <respond|reply|react|ignore|status_change>\n\
             CONFIDENCE: <0.0-1.0>\n\
             REASONING: <one line>\n\
             EMOJI: <only for react>\n\
             STATUS: <only for status_change: online|away|dnd|invisible>\n",
        );
        if batched {
            out.push_str(
                "\nSeveral messages arrived at once. Choose \"respond\" to address \
                 the channel as a whole, or \"reply\" to answer one specific message \
                 in a thread.\n",
            );
        }
        out
    }

    fn render_single_prompt(
        &self,
        message: &ConversationMessage,
        ctx: &ChannelContext,
        recent: &[ConversationMessage],
    ) -> String {
        format!(
            "{}{}\nNew message from {}: {}{}\n{}",
            self.render_header(ctx),
            Self::render_preview(recent),
            message.author,
            message.content,
            Self::render_images(message),
            Self::render_format_instructions(false),
        )
    }

    fn render_batch_prompt(
        &self,
        message: &ConversationMessage,
        ctx: &ChannelContext,
        recent: &[ConversationMessage],
    ) -> String {
        let mut constituents = String::new();
        for (i, original) in message.original_messages.iter().enumerate() {
            constituents.push_str(&format!("{}. {}", i + 1, original.content));
            for img in &original.image_analysis {
                constituents.push_str(&format!(" [Image: {}]", img.analysis));
            }
            constituents.push('\n');
        }

        format!(
            "{}{}\n{} sent {} messages in quick succession:\n{}{}",
            self.render_header(ctx),
            Self::render_preview(recent),
            message.author,
            message.original_messages.len(),
            constituents,
            Self::render_format_instructions(true),
        )
    }
}

/// Parse the model's line-oriented decision reply.
///
/// `message_content` feeds the emoji heuristic when the model chose `react`
/// without naming an emoji, so every returned decision satisfies the
/// non-empty-emoji invariant.
pub fn parse_decision(raw: &str, message_content: &str) -> Result<Decision, DecisionError> {
    let mut action: Option<Action> = None;
    let mut confidence: f32 = 0.5;
    let mut reasoning = String::new();
    let mut emoji: Option<String> = None;
    let mut status: Option<Presence> = None;

    for line in raw.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_uppercase().as_str() {
            "ACTION" => {
                action = Some(
                    Action::parse(value)
                        .ok_or_else(|| DecisionError::UnknownAction(value.to_string()))?,
                );
            }
            "CONFIDENCE" => {
                if let Ok(parsed) = value.parse::<f32>() {
                    confidence = parsed;
                }
            }
            "REASONING" => reasoning = value.to_string(),
            "EMOJI" => {
                if !value.is_empty() {
                    emoji = Some(value.to_string());
                }
            }
            "STATUS" => {
                if !value.is_empty() {
                    status = Some(
                        Presence::parse(value)
                            .ok_or_else(|| DecisionError::UnknownStatus(value.to_string()))?,
                    );
                }
            }
            _ => {}
        }
    }

    let Some(action) = action else {
        return Err(DecisionError::ParseFailed {
            reason: "missing ACTION line".into(),
            raw_preview: raw.chars().take(80).collect(),
        });
    };

    let mut decision = Decision::new(action, confidence, reasoning);
    match action {
        Action::React => {
            let emoji = emoji.unwrap_or_else(|| emoji::suggest(message_content));
            decision = decision.with_emoji(emoji);
        }
        Action::StatusChange => {
            let Some(status) = status else {
                return Err(DecisionError::MissingField("STATUS"));
            };
            decision = decision.with_status(status);
        }
        _ => {}
    }

    debug_assert!(decision.fields_valid());
    Ok(decision)
}
