//! End-to-end flow: ingest → decide → execute, with a scripted model and a
//! recording gateway, the way the ingestion collaborator drives the core.

use async_trait::async_trait;
use corvid_agent::decision::DecisionEngine;
use corvid_agent::router::{ActionRouter, ExecutionOutcome};
use corvid_config::BotSettings;
use corvid_core::channel::{
    ActivityLevel, ChannelContext, ChannelId, ChannelPermissions, ChannelScope, ChatGateway,
};
use corvid_core::decision::{Action, Decision, Presence};
use corvid_core::error::{GatewayError, ModelError};
use corvid_core::event::{DomainEvent, EventBus};
use corvid_core::message::{ConversationMessage, InboundMessage};
use corvid_core::provider::{CompletionRequest, CompletionResponse, ModelClient};
use corvid_memory::ChannelHistoryStore;
use corvid_scheduler::RequestScheduler;
use std::sync::{Arc, Mutex};

/// Answers decision prompts with a scripted decision and everything else
/// with a scripted chat line.
struct ScriptedModel {
    decision_reply: String,
    generation_reply: String,
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ModelError> {
        // Decision prompts carry the wire-format instructions.
        let text = if request.prompt.contains("ACTION:") {
            self.decision_reply.clone()
        } else {
            self.generation_reply.clone()
        };
        Ok(CompletionResponse {
            text,
            model: "scripted".into(),
            usage: None,
        })
    }
}

#[derive(Default)]
struct SentLog {
    messages: Vec<(String, Option<String>)>,
    reactions: Vec<(String, String)>,
}

struct RecordingGateway {
    log: Mutex<SentLog>,
}

impl RecordingGateway {
    fn new() -> Self {
        Self {
            log: Mutex::new(SentLog::default()),
        }
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_message(&self, _channel: &ChannelId, content: &str) -> Result<(), GatewayError> {
        self.log
            .lock()
            .unwrap()
            .messages
            .push((content.into(), None));
        Ok(())
    }

    async fn send_reply(
        &self,
        _channel: &ChannelId,
        content: &str,
        reply_to: &str,
    ) -> Result<(), GatewayError> {
        self.log
            .lock()
            .unwrap()
            .messages
            .push((content.into(), Some(reply_to.into())));
        Ok(())
    }

    async fn add_reaction(
        &self,
        _channel: &ChannelId,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), GatewayError> {
        self.log
            .lock()
            .unwrap()
            .reactions
            .push((message_id.into(), emoji.into()));
        Ok(())
    }

    async fn set_presence(&self, _status: Presence) -> Result<(), GatewayError> {
        Ok(())
    }

    fn permissions(&self, _channel: &ChannelId) -> ChannelPermissions {
        ChannelPermissions::all()
    }
}

struct Harness {
    gateway: Arc<RecordingGateway>,
    history: ChannelHistoryStore,
    engine: DecisionEngine,
    router: ActionRouter,
    events: Arc<EventBus>,
}

fn harness(decision_reply: &str, generation_reply: &str) -> Harness {
    let settings = Arc::new(BotSettings::default());
    let scheduler = RequestScheduler::new();
    let events = Arc::new(EventBus::default());
    let gateway = Arc::new(RecordingGateway::new());
    let history = ChannelHistoryStore::new();
    let model: Arc<dyn ModelClient> = Arc::new(ScriptedModel {
        decision_reply: decision_reply.into(),
        generation_reply: generation_reply.into(),
    });

    let engine = DecisionEngine::new(
        scheduler.clone(),
        model.clone(),
        settings.clone(),
        events.clone(),
    );
    let router = ActionRouter::new(
        gateway.clone(),
        scheduler,
        model,
        history.clone(),
        settings,
        events.clone(),
    );

    Harness {
        gateway,
        history,
        engine,
        router,
        events,
    }
}

fn channel() -> ChannelId {
    ChannelId("chan-42".into())
}

fn ctx() -> ChannelContext {
    ChannelContext {
        channel_id: channel(),
        channel_name: "general".into(),
        scope: ChannelScope::Guild {
            id: "g1".into(),
            name: "Bird Watchers".into(),
        },
        activity: ActivityLevel::Normal,
        last_action_at: None,
    }
}

fn ingest(content: &str) -> ConversationMessage {
    ConversationMessage::batched(
        "Alice",
        vec![InboundMessage::new("m-100", "Alice", content)],
        channel(),
    )
}

#[tokio::test(start_paused = true)]
async fn decide_then_respond_end_to_end() {
    let h = harness(
        "ACTION: respond\nCONFIDENCE: 0.9\nREASONING: they addressed me directly\n",
        "Corvid: *ruffles feathers* Happy to weigh in. Crows win, obviously.",
    );
    let mut event_rx = h.events.subscribe();

    // Ingestion collaborator appends the user message first.
    let message = ingest("corvid, crows or magpies?");
    h.history.append(message.clone()).await;

    let recent = h.history.recent(&channel(), 3).await;
    let decision = h.engine.decide(&message, &ctx(), &recent).await.unwrap();
    assert_eq!(decision.action, Action::Respond);

    let outcome = h.router.execute(&decision, &message, &ctx()).await.unwrap();
    let ExecutionOutcome::Sent { content, threaded } = outcome else {
        panic!("expected a send");
    };
    assert!(!threaded);
    // Prefix and action text scrubbed by the response processor.
    assert_eq!(content, "Happy to weigh in. Crows win, obviously.");

    // The send reached the platform.
    let log = h.gateway.log.lock().unwrap();
    assert_eq!(log.messages.len(), 1);
    assert_eq!(log.messages[0].0, content);
    drop(log);

    // History now holds the user turn and the bot turn, oldest first.
    let all = h.history.all(&channel()).await;
    assert_eq!(all.len(), 2);
    assert!(!all[0].is_bot);
    assert!(all[1].is_bot);
    assert_eq!(all[1].content, content);

    // Observability events fired in order.
    let mut saw_decision = false;
    let mut saw_sent = false;
    while let Ok(event) = event_rx.try_recv() {
        match event.as_ref() {
            DomainEvent::DecisionMade { action, .. } => {
                assert_eq!(action, "respond");
                saw_decision = true;
            }
            DomainEvent::ResponseSent { chars, .. } => {
                assert_eq!(*chars, content.chars().count());
                saw_sent = true;
            }
            _ => {}
        }
    }
    assert!(saw_decision && saw_sent);
}

#[tokio::test(start_paused = true)]
async fn batched_reply_threads_to_the_question() {
    let h = harness(
        "ACTION: reply\nCONFIDENCE: 0.8\nREASONING: one of these needs an answer\n",
        "Tuesday evening suits me.",
    );

    let message = ConversationMessage::batched(
        "Alice",
        vec![
            InboundMessage::new("m-1", "Alice", "ok regrouping"),
            InboundMessage::new("m-2", "Alice", "when should we meet?"),
            InboundMessage::new("m-3", "Alice", "no rush"),
        ],
        channel(),
    );
    h.history.append(message.clone()).await;

    let decision = h.engine.decide(&message, &ctx(), &[]).await.unwrap();
    assert_eq!(decision.action, Action::Reply);

    let outcome = h.router.execute(&decision, &message, &ctx()).await.unwrap();
    assert!(matches!(outcome, ExecutionOutcome::Sent { threaded: true, .. }));

    let log = h.gateway.log.lock().unwrap();
    assert_eq!(log.messages[0].1.as_deref(), Some("m-2"));
}

#[tokio::test]
async fn react_flows_through_without_generation() {
    let h = harness(
        "ACTION: react\nCONFIDENCE: 0.7\nREASONING: that was funny\nEMOJI: 😂\n",
        "should never be used",
    );

    let message = ingest("lmao the pigeon stole his sandwich");
    h.history.append(message.clone()).await;

    let decision = h.engine.decide(&message, &ctx(), &[]).await.unwrap();
    let outcome = h.router.execute(&decision, &message, &ctx()).await.unwrap();

    assert_eq!(
        outcome,
        ExecutionOutcome::Reacted { emoji: "😂".into() }
    );
    let log = h.gateway.log.lock().unwrap();
    assert!(log.messages.is_empty());
    assert_eq!(log.reactions, vec![("m-100".to_string(), "😂".to_string())]);
}

#[tokio::test]
async fn malformed_decision_falls_back_to_ignore() {
    let h = harness("I think I'll just chat about it instead!", "unused");

    let message = ingest("hello there");
    let result = h.engine.decide(&message, &ctx(), &[]).await;
    assert!(result.is_err());

    // The documented caller fallback: ignore, confidence zero, loop alive.
    let decision = result.unwrap_or_else(|e| Decision::fallback_ignore(e.to_string()));
    assert_eq!(decision.action, Action::Ignore);
    assert_eq!(decision.confidence, 0.0);

    let outcome = h.router.execute(&decision, &message, &ctx()).await.unwrap();
    assert_eq!(outcome, ExecutionOutcome::Ignored);
    assert!(h.gateway.log.lock().unwrap().messages.is_empty());
}
