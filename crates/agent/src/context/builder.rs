//! Context-window builder — deterministic, token-bounded prompt rendering.
//!
//! Assembles a prompt from fixed sections (system instructions, persona
//! identity, cleaned style examples) and as much recent conversation
//! history as the token budget allows, newest first, rendered oldest→newest.
//!
//! Assembly is pure and deterministic: identical inputs always produce
//! identical output, and nothing here yields or blocks.

use crate::context::token;
use crate::text;
use corvid_core::message::ConversationMessage;
use corvid_core::persona::Persona;
use serde::{Deserialize, Serialize};

/// Budget configuration for the builder.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Total token ceiling for the assembled prompt.
    pub context_limit: usize,

    /// Fraction of the ceiling held back as a safety reserve.
    pub safety_buffer_fraction: f32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            context_limit: 4096,
            safety_buffer_fraction: 0.1,
        }
    }
}

/// All inputs for a single prompt build.
pub struct PromptInput<'a> {
    /// The persona speaking.
    pub persona: &'a Persona,

    /// System instructions, always rendered first.
    pub system_prompt: &'a str,

    /// Chronological (oldest-first) channel history.
    pub history: &'a [ConversationMessage],

    /// The literal triggering message, rendered in a dedicated section
    /// rather than guessed from history.
    pub replying_to: Option<&'a ConversationMessage>,
}

/// Budget accounting for one build. Derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBudget {
    pub context_limit: usize,
    pub safety_buffer_fraction: f32,

    /// Estimated cost of the fixed sections.
    pub base_tokens: usize,

    /// What remained for history after the base cost and safety reserve.
    pub history_token_budget: usize,

    /// Estimated cost of the history lines actually included.
    pub history_tokens: usize,

    /// How many history messages made the cut.
    pub messages_included: usize,
}

/// The rendered prompt plus its budget accounting.
#[derive(Debug, Clone)]
pub struct BuiltPrompt {
    pub prompt: String,
    pub budget: PromptBudget,
}

/// Non-failing budget diagnosis for callers that want to warn operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenValidation {
    pub base_tokens: usize,
    pub usable_tokens: usize,
    pub history_token_budget: usize,

    /// Base cost as a percentage of the usable budget.
    pub usage_pct: f32,

    pub recommendations: Vec<String>,
}

const HISTORY_HEADER: &str = "Recent conversation:";

/// The context window builder. Stateless: create one and reuse it.
pub struct ContextWindowBuilder {
    config: ContextConfig,
    estimator: fn(&str) -> usize,
}

impl ContextWindowBuilder {
    /// Create a builder with the given budget configuration.
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            estimator: token::estimate_tokens,
        }
    }

    /// Replace the token estimator (tests pin it to a stub so budget
    /// cutoffs are exact).
    pub fn with_estimator(mut self, estimator: fn(&str) -> usize) -> Self {
        self.estimator = estimator;
        self
    }

    /// Assemble the prompt.
    ///
    /// 1. Render the fixed sections and estimate `base_tokens`.
    /// 2. `history_token_budget = limit*(1-buffer) - base_tokens`.
    /// 3. Walk history newest→oldest, accumulating formatted lines until
    ///    the next line would overflow; re-reverse so the rendered section
    ///    reads oldest→newest.
    /// 4. Append the "replying to" section when a triggering message is
    ///    supplied.
    pub fn build(&self, input: &PromptInput<'_>) -> BuiltPrompt {
        let fixed = self.render_fixed_sections(input);
        let base_tokens = (self.estimator)(&fixed);

        let usable = self.usable_tokens();
        let history_token_budget = usable.saturating_sub(base_tokens);

        // Newest-first walk; stop before the line that would overflow.
        let mut included: Vec<String> = Vec::new();
        let mut history_tokens = 0usize;
        for message in input.history.iter().rev() {
            let line = Self::format_history_line(message);
            let line_tokens = (self.estimator)(&line);
            if history_tokens + line_tokens > history_token_budget {
                break;
            }
            history_tokens += line_tokens;
            included.push(line);
        }
        let messages_included = included.len();
        // Restore chronological order for the rendered section.
        included.reverse();

        let mut prompt = fixed;
        if !included.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(HISTORY_HEADER);
            for line in &included {
                prompt.push('\n');
                prompt.push_str(line);
            }
        }

        if let Some(trigger) = input.replying_to {
            prompt.push_str("\n\nYou are replying to this message from ");
            prompt.push_str(&trigger.author);
            prompt.push_str(": \"");
            prompt.push_str(&trigger.content);
            prompt.push('"');
            for img in &trigger.image_analysis {
                prompt.push_str(&format!(" [Image: {}]", img.analysis));
            }
        }

        BuiltPrompt {
            prompt,
            budget: PromptBudget {
                context_limit: self.config.context_limit,
                safety_buffer_fraction: self.config.safety_buffer_fraction,
                base_tokens,
                history_token_budget,
                history_tokens,
                messages_included,
            },
        }
    }

    /// Report how much of the budget the fixed content consumes, with
    /// recommendations. Never fails; callers decide whether to proceed.
    pub fn validate_token_limits(&self, input: &PromptInput<'_>) -> TokenValidation {
        let fixed = self.render_fixed_sections(input);
        let base_tokens = (self.estimator)(&fixed);
        let usable = self.usable_tokens();
        let history_token_budget = usable.saturating_sub(base_tokens);

        let usage_pct = if usable == 0 {
            100.0
        } else {
            (base_tokens as f32 / usable as f32) * 100.0
        };

        let mut recommendations = Vec::new();
        if history_token_budget == 0 {
            recommendations.push(
                "base content consumes the entire budget; no history can be included".into(),
            );
        } else if base_tokens * 2 > usable {
            recommendations.push(
                "base content exceeds 50% of budget; trim the system prompt or style examples"
                    .into(),
            );
        }

        TokenValidation {
            base_tokens,
            usable_tokens: usable,
            history_token_budget,
            usage_pct,
            recommendations,
        }
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn usable_tokens(&self) -> usize {
        let fraction = 1.0 - self.config.safety_buffer_fraction;
        (self.config.context_limit as f32 * fraction).floor() as usize
    }

    fn render_fixed_sections(&self, input: &PromptInput<'_>) -> String {
        let persona = input.persona;
        let mut fixed = String::with_capacity(1024);
        fixed.push_str(input.system_prompt);
        fixed.push_str("\n\nYou are ");
        fixed.push_str(&persona.name);
        fixed.push_str(". ");
        fixed.push_str(&persona.description);

        let cleaned: Vec<String> = persona
            .style_examples
            .iter()
            .map(|e| Self::clean_style_example(e))
            .filter(|e| !e.is_empty())
            .collect();
        if !cleaned.is_empty() {
            fixed.push_str(&format!("\n\nHow {} speaks:", persona.name));
            for example in &cleaned {
                fixed.push_str("\n- ");
                fixed.push_str(example);
            }
        }

        fixed
    }

    /// Strip `Name:` / `Name (emotion):` prefixes and `[action]` text from
    /// a style example line.
    fn clean_style_example(example: &str) -> String {
        let without_actions = text::strip_bracketed(example);
        let stripped = text::strip_speaker_prefix(&without_actions);
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn format_history_line(message: &ConversationMessage) -> String {
        let mut line = format!("{}: {}", message.author, message.content);
        for img in &message.image_analysis {
            line.push_str(&format!(" [Image: {}]", img.analysis));
        }
        line
    }
}
