//! Persona — the agent's configured character.
//!
//! Persona fields arrive from the settings collaborator; this type is the
//! in-process shape the prompt builder consumes.

use serde::{Deserialize, Serialize};

/// The agent's name, description, and speech-style examples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    /// The character's name as it appears in chat.
    pub name: String,

    /// A prose description of who the character is.
    pub description: String,

    /// Example lines in the character's voice. May carry `Name:` or
    /// `Name (emotion):` prefixes and `[bracketed action]` text from the
    /// source material; the prompt builder strips those at render time.
    #[serde(default)]
    pub style_examples: Vec<String>,
}

impl Persona {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            style_examples: Vec::new(),
        }
    }

    pub fn with_style_examples(mut self, examples: Vec<String>) -> Self {
        self.style_examples = examples;
        self
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            name: "Corvid".into(),
            description: "A curious, dry-witted companion who lurks in chat \
                          and chimes in when it has something worth saying."
                .into(),
            style_examples: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_persona_has_name() {
        let p = Persona::default();
        assert_eq!(p.name, "Corvid");
        assert!(!p.description.is_empty());
    }

    #[test]
    fn builder_style() {
        let p = Persona::new("Magpie", "Collector of shiny facts")
            .with_style_examples(vec!["Magpie: ooh, shiny.".into()]);
        assert_eq!(p.style_examples.len(), 1);
    }
}
