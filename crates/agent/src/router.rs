//! Action router — realizes a [`Decision`] as an external effect.
//!
//! Every execution passes a validation gate first (permissions + required
//! fields); a blocked action produces a failed result and no side effect.
//! Response-type actions run the generation pipeline (context builder →
//! scheduler → response processor) and simulate a human-like typing delay
//! before the send.

use crate::context::{BuiltPrompt, ContextConfig, ContextWindowBuilder, PromptInput};
use crate::response::ResponseProcessor;
use corvid_config::BotSettings;
use corvid_core::channel::{ChannelContext, ChatGateway};
use corvid_core::decision::{Action, Decision, Presence};
use corvid_core::error::{ActionError, GatewayError};
use corvid_core::event::{DomainEvent, EventBus};
use corvid_core::message::{ConversationMessage, InboundMessage};
use corvid_core::persona::Persona;
use corvid_core::provider::{CompletionRequest, ModelClient};
use corvid_memory::ChannelHistoryStore;
use corvid_scheduler::{kinds, RequestScheduler};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sent when the generation pipeline fails. A short fixed line beats
/// silence after the bot has visibly decided to speak.
const GENERATION_FALLBACK: &str = "...sorry, lost my train of thought. what were we saying?";

/// How many recent turns the generation prompt may draw from (the token
/// budget decides how many actually fit).
const GENERATION_HISTORY_POOL: usize = 50;

/// What an execution actually did.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Sent { content: String, threaded: bool },
    Reacted { emoji: String },
    PresenceSet(Presence),
    Ignored,
}

/// Routes decisions to their side effects.
pub struct ActionRouter {
    gateway: Arc<dyn ChatGateway>,
    scheduler: RequestScheduler,
    model: Arc<dyn ModelClient>,
    history: ChannelHistoryStore,
    builder: ContextWindowBuilder,
    processor: ResponseProcessor,
    settings: Arc<BotSettings>,
    persona: Persona,
    events: Arc<EventBus>,
}

impl ActionRouter {
    pub fn new(
        gateway: Arc<dyn ChatGateway>,
        scheduler: RequestScheduler,
        model: Arc<dyn ModelClient>,
        history: ChannelHistoryStore,
        settings: Arc<BotSettings>,
        events: Arc<EventBus>,
    ) -> Self {
        let builder = ContextWindowBuilder::new(ContextConfig {
            context_limit: settings.context_limit,
            safety_buffer_fraction: settings.context.safety_buffer_fraction,
        });
        let processor = ResponseProcessor::new(settings.max_characters);
        let persona = settings.persona.to_persona();
        Self {
            gateway,
            scheduler,
            model,
            history,
            builder,
            processor,
            settings,
            persona,
            events,
        }
    }

    /// Execute a decision against the triggering message.
    pub async fn execute(
        &self,
        decision: &Decision,
        message: &ConversationMessage,
        ctx: &ChannelContext,
    ) -> Result<ExecutionOutcome, ActionError> {
        self.validation_gate(decision, ctx)?;

        match decision.action {
            Action::Respond => self.execute_send(message, ctx, false).await,
            Action::Reply => self.execute_send(message, ctx, true).await,
            Action::React => self.execute_react(decision, message, ctx).await,
            Action::StatusChange => self.execute_status(decision).await,
            Action::Ignore => {
                info!(
                    channel = %ctx.channel_id,
                    reasoning = %decision.reasoning,
                    "Ignoring message"
                );
                Ok(ExecutionOutcome::Ignored)
            }
        }
    }

    /// Permission and required-field checks. Runs before any side effect;
    /// a failure here is a failed execution result, never a partial action.
    fn validation_gate(
        &self,
        decision: &Decision,
        ctx: &ChannelContext,
    ) -> Result<(), ActionError> {
        let action = decision.action;
        let permissions = self.gateway.permissions(&ctx.channel_id);

        let (allowed, permission_name) = match action {
            Action::Respond | Action::Reply => (permissions.send_messages, "send_messages"),
            Action::React => (permissions.add_reactions, "add_reactions"),
            Action::StatusChange => (permissions.manage_presence, "manage_presence"),
            Action::Ignore => (true, ""),
        };
        if !allowed {
            self.events.publish(DomainEvent::ActionBlocked {
                channel: ctx.channel_id.to_string(),
                action: action.as_str().into(),
                reason: format!("missing permission {permission_name}"),
                timestamp: chrono::Utc::now(),
            });
            return Err(ActionError::PermissionDenied {
                action: action.as_str().into(),
                permission: permission_name.into(),
                channel: ctx.channel_id.to_string(),
            });
        }

        if !decision.fields_valid() {
            let field = match action {
                Action::React => "emoji",
                Action::StatusChange => "status",
                _ => "unknown",
            };
            return Err(ActionError::MissingField {
                action: action.as_str().into(),
                field,
            });
        }

        Ok(())
    }

    // ── Respond / Reply ───────────────────────────────────────────────────

    async fn execute_send(
        &self,
        message: &ConversationMessage,
        ctx: &ChannelContext,
        threaded: bool,
    ) -> Result<ExecutionOutcome, ActionError> {
        let content = self.generate_response(message, ctx).await;

        self.simulate_typing(ctx, content.chars().count()).await;

        if threaded {
            match reply_anchor(message) {
                Some(anchor) => {
                    self.gateway
                        .send_reply(&ctx.channel_id, &content, anchor)
                        .await?;
                }
                None => {
                    // No platform ID to anchor to; degrade to a plain send.
                    warn!(channel = %ctx.channel_id, "Reply requested without an anchor, sending normally");
                    self.gateway.send_message(&ctx.channel_id, &content).await?;
                }
            }
        } else {
            self.gateway.send_message(&ctx.channel_id, &content).await?;
        }

        self.history
            .append(ConversationMessage::bot(
                &self.persona.name,
                &content,
                ctx.channel_id.clone(),
            ))
            .await;

        self.events.publish(DomainEvent::ResponseSent {
            channel: ctx.channel_id.to_string(),
            chars: content.chars().count(),
            threaded,
            timestamp: chrono::Utc::now(),
        });

        Ok(ExecutionOutcome::Sent { content, threaded })
    }

    /// Run the generation pipeline. Infallible by design: a model failure
    /// degrades to the fixed fallback line rather than silence.
    async fn generate_response(
        &self,
        message: &ConversationMessage,
        ctx: &ChannelContext,
    ) -> String {
        let history = self
            .history
            .recent(&ctx.channel_id, GENERATION_HISTORY_POOL)
            .await;

        let BuiltPrompt { prompt, budget } = self.builder.build(&PromptInput {
            persona: &self.persona,
            system_prompt: &self.settings.system_prompt,
            history: &history,
            replying_to: Some(message),
        });

        self.events.publish(DomainEvent::PromptAssembled {
            channel: ctx.channel_id.to_string(),
            total_tokens: budget.base_tokens + budget.history_tokens,
            messages_included: budget.messages_included,
            timestamp: chrono::Utc::now(),
        });

        let max_tokens = (self.settings.max_characters as u32).div_ceil(3).max(64);
        let request = CompletionRequest {
            model: self.settings.model.clone(),
            prompt,
            params: self.settings.sampling(),
            max_tokens: Some(max_tokens),
        };
        let model = self.model.clone();
        let raw = self
            .scheduler
            .submit(kinds::GENERATION, async move {
                model.complete(request).await.map(|r| r.text)
            })
            .await;

        match raw {
            Ok(raw) => {
                let processed = self.processor.process(&raw);
                if processed.report.empty {
                    warn!(channel = %ctx.channel_id, "Generation produced empty text, using fallback");
                    GENERATION_FALLBACK.into()
                } else {
                    if !processed.report.is_clean() {
                        debug!(
                            channel = %ctx.channel_id,
                            issues = ?processed.report.issues(),
                            "Sending flagged response"
                        );
                    }
                    processed.text
                }
            }
            Err(e) => {
                warn!(channel = %ctx.channel_id, error = %e, "Generation failed, using fallback");
                self.events.publish(DomainEvent::ModelCallFailed {
                    kind: kinds::GENERATION.to_string(),
                    error_message: e.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                GENERATION_FALLBACK.into()
            }
        }
    }

    /// Show the typing indicator, then wait a human-plausible interval.
    async fn simulate_typing(&self, ctx: &ChannelContext, response_chars: usize) {
        if let Err(e) = self.gateway.send_typing(&ctx.channel_id).await {
            debug!(channel = %ctx.channel_id, error = %e, "Typing indicator failed");
        }

        let timing = &self.settings.timing;
        let pause_ms = if timing.thinking_pause_max_ms > timing.thinking_pause_min_ms {
            rand::thread_rng()
                .gen_range(timing.thinking_pause_min_ms..=timing.thinking_pause_max_ms)
        } else {
            timing.thinking_pause_min_ms
        };
        let delay = compute_typing_delay(
            response_chars,
            timing.typing_ms_per_char,
            pause_ms,
            timing.typing_delay_cap_ms,
        );
        tokio::time::sleep(delay).await;
    }

    // ── React ─────────────────────────────────────────────────────────────

    async fn execute_react(
        &self,
        decision: &Decision,
        message: &ConversationMessage,
        ctx: &ChannelContext,
    ) -> Result<ExecutionOutcome, ActionError> {
        // Gate guarantees presence and non-emptiness.
        let emoji = decision.emoji.clone().unwrap_or_default();

        let Some(anchor) = reply_anchor(message) else {
            return Err(ActionError::Gateway(GatewayError::InvalidTarget(
                "no platform message id to react to".into(),
            )));
        };

        self.gateway
            .add_reaction(&ctx.channel_id, anchor, &emoji)
            .await?;

        self.events.publish(DomainEvent::ReactionAdded {
            channel: ctx.channel_id.to_string(),
            emoji: emoji.clone(),
            timestamp: chrono::Utc::now(),
        });

        Ok(ExecutionOutcome::Reacted { emoji })
    }

    // ── Status change ─────────────────────────────────────────────────────

    async fn execute_status(&self, decision: &Decision) -> Result<ExecutionOutcome, ActionError> {
        // Gate guarantees presence; the enum keeps the mapping total.
        let status = decision.status.unwrap_or(Presence::Online);
        self.gateway.set_presence(status).await?;

        self.events.publish(DomainEvent::PresenceChanged {
            status: status.as_str().into(),
            timestamp: chrono::Utc::now(),
        });

        Ok(ExecutionOutcome::PresenceSet(status))
    }
}

/// The platform message to anchor a reply or reaction to.
///
/// For a batch, [`select_reply_target`] picks the constituent; a single
/// message ingested from the platform carries itself as its only original.
fn reply_anchor(message: &ConversationMessage) -> Option<&str> {
    if message.original_messages.is_empty() {
        return None;
    }
    Some(select_reply_target(&message.original_messages).message_id.as_str())
}

/// Choose which constituent of a batch a threaded reply should anchor to.
///
/// Priority: (a) the first message carrying an attachment/image, else
/// (b) the first containing a question mark, else (c) the longest with
/// non-trivial content that is not a bare URL, else (d) the last. Pure and
/// deterministic for identical input.
pub fn select_reply_target(originals: &[InboundMessage]) -> &InboundMessage {
    debug_assert!(!originals.is_empty());

    if let Some(with_attachment) = originals
        .iter()
        .find(|m| m.has_attachment || !m.image_analysis.is_empty())
    {
        return with_attachment;
    }

    if let Some(question) = originals.iter().find(|m| m.content.contains('?')) {
        return question;
    }

    let substantial = originals
        .iter()
        .filter(|m| {
            let content = m.content.trim();
            content.chars().count() > 5 && !is_bare_url(content)
        })
        .fold(None::<&InboundMessage>, |best, candidate| match best {
            // Strictly-greater keeps the earliest of equal lengths.
            Some(b) if candidate.content.chars().count() > b.content.chars().count() => {
                Some(candidate)
            }
            Some(b) => Some(b),
            None => Some(candidate),
        });
    if let Some(m) = substantial {
        return m;
    }

    originals.last().unwrap()
}

fn is_bare_url(content: &str) -> bool {
    (content.starts_with("http://") || content.starts_with("https://"))
        && !content.contains(char::is_whitespace)
}

/// Length-proportional typing delay plus a thinking pause, capped.
fn compute_typing_delay(
    response_chars: usize,
    ms_per_char: u64,
    thinking_pause_ms: u64,
    cap_ms: u64,
) -> Duration {
    let typing_ms = (response_chars as u64).saturating_mul(ms_per_char);
    Duration::from_millis(typing_ms.saturating_add(thinking_pause_ms).min(cap_ms))
}
