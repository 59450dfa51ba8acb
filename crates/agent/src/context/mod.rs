//! Context-window assembly: persona, style examples, and budgeted history.

pub mod builder;
pub mod token;

pub use builder::{BuiltPrompt, ContextConfig, ContextWindowBuilder, PromptBudget, PromptInput, TokenValidation};
