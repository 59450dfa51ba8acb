//! # Corvid Core
//!
//! Domain types, traits, and error definitions for the Corvid autonomous
//! chat agent. This crate defines the domain model that all other crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is defined as a trait here (`ModelClient`,
//! `ChatGateway`); implementations live in their respective crates. This
//! enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod channel;
pub mod decision;
pub mod error;
pub mod event;
pub mod message;
pub mod persona;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use channel::{ActivityLevel, ChannelContext, ChannelId, ChannelPermissions, ChannelScope, ChatGateway};
pub use decision::{Action, Decision, Presence};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use message::{ConversationMessage, ImageAnalysis, InboundMessage};
pub use persona::Persona;
pub use provider::{CompletionRequest, CompletionResponse, ModelClient, SamplingParams, Usage};
