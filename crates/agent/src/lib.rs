//! # Corvid Agent
//!
//! The autonomous-response core: decide whether to act on an incoming
//! message, then act. Four cooperating parts:
//!
//! - [`context`] — token-bounded prompt assembly from persona, style
//!   examples, and channel history
//! - [`decision`] — message classification into a typed [`Decision`]
//! - [`response`] — raw model output → clean, bounded chat text
//! - [`router`] — decisions → external effects, behind a validation gate
//!
//! The ingestion collaborator drives the flow:
//! `DecisionEngine::decide` → `ActionRouter::execute`, appending every user
//! and bot message to the shared [`ChannelHistoryStore`].
//!
//! [`Decision`]: corvid_core::decision::Decision
//! [`ChannelHistoryStore`]: corvid_memory::ChannelHistoryStore

pub mod context;
pub mod decision;
pub mod emoji;
pub mod response;
pub mod router;

mod text;

pub use context::{BuiltPrompt, ContextConfig, ContextWindowBuilder, PromptBudget, PromptInput};
pub use decision::DecisionEngine;
pub use response::{ProcessedResponse, ResponseProcessor, ValidationReport};
pub use router::{ActionRouter, ExecutionOutcome};
