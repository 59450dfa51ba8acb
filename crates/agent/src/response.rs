//! Response processor — turns raw model output into a clean, bounded,
//! single-line chat message.
//!
//! Pipeline order matters: emphasis-wrapped action text goes first (so
//! `*waves*` disappears entirely while `**bold**` keeps its content), then
//! speaker prefixes, then leftover markup, then whitespace flattening, then
//! the character ceiling.

use crate::text;
use corvid_config::PLATFORM_HARD_LIMIT;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quality flags raised after processing. Informational only: flags never
/// block a send, and callers decide what a flagged response is worth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub empty: bool,
    pub too_short: bool,
    pub exceeds_platform_limit: bool,
    pub leftover_markup: bool,
    pub abrupt_ending: bool,
    pub repeated_sentences: bool,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        !(self.empty
            || self.too_short
            || self.exceeds_platform_limit
            || self.leftover_markup
            || self.abrupt_ending
            || self.repeated_sentences)
    }

    /// Names of the raised flags, for logging.
    pub fn issues(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.empty {
            out.push("empty");
        }
        if self.too_short {
            out.push("too_short");
        }
        if self.exceeds_platform_limit {
            out.push("exceeds_platform_limit");
        }
        if self.leftover_markup {
            out.push("leftover_markup");
        }
        if self.abrupt_ending {
            out.push("abrupt_ending");
        }
        if self.repeated_sentences {
            out.push("repeated_sentences");
        }
        out
    }
}

/// A processed response plus its quality report.
#[derive(Debug, Clone)]
pub struct ProcessedResponse {
    pub text: String,
    pub report: ValidationReport,
}

/// The response processor. Stateless apart from the configured ceiling.
pub struct ResponseProcessor {
    max_characters: usize,
}

impl ResponseProcessor {
    pub fn new(max_characters: usize) -> Self {
        Self { max_characters }
    }

    /// Run the full pipeline on raw model output.
    pub fn process(&self, raw: &str) -> ProcessedResponse {
        let text = strip_emphasis_spans(raw);
        let text = text::strip_speaker_prefix(&text).to_string();
        let text = strip_markup(&text);
        let text = flatten_whitespace(&text);
        let text = limit_characters(&text, self.max_characters);

        let report = validate(&text);
        if !report.is_clean() {
            debug!(issues = ?report.issues(), "Response flagged by validation");
        }

        ProcessedResponse { text, report }
    }
}

/// Remove `*...*` emphasis spans (action descriptions) along with their
/// content, and any stray `*` left unpaired. Doubled markers (`**bold**`)
/// form empty spans, so bold text survives with its markers gone.
fn strip_emphasis_spans(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '*' {
            match chars[i + 1..].iter().position(|&c| c == '*') {
                // Drop the span and both markers.
                Some(offset) => i += offset + 2,
                // Stray marker, drop it alone.
                None => i += 1,
            }
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    out
}

/// Remove remaining structural markers: underscores, strikethrough, code.
fn strip_markup(s: &str) -> String {
    s.chars().filter(|c| !matches!(c, '_' | '~' | '`')).collect()
}

/// Collapse runs of whitespace (newlines included) into single spaces;
/// the destination is a flat chat message.
fn flatten_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Enforce the character ceiling.
///
/// Past the limit: cut at the last sentence-ending mark inside the window
/// if that point is past 70% of the limit; otherwise cut at the last word
/// boundary and append an ellipsis; otherwise hard-cut. Idempotent:
/// applying it twice equals applying it once.
pub fn limit_characters(s: &str, limit: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= limit {
        return s.to_string();
    }
    if limit == 0 {
        return String::new();
    }

    let window = &chars[..limit];

    // Sentence boundary, if it lands late enough.
    if let Some(pos) = window.iter().rposition(|c| matches!(c, '.' | '!' | '?')) {
        if pos + 1 >= (limit * 7) / 10 {
            let cut: String = window[..=pos].iter().collect();
            return cut.trim_end().to_string();
        }
    }

    // Word boundary, reserving one character for the ellipsis.
    let reserved = &chars[..limit - 1];
    if let Some(pos) = reserved.iter().rposition(|c| c.is_whitespace()) {
        if pos > 0 {
            let mut cut: String = reserved[..pos].iter().collect();
            cut = cut.trim_end().to_string();
            cut.push('…');
            return cut;
        }
    }

    // Hard cut.
    window.iter().collect()
}

/// Post-processing quality checks. Never blocking.
fn validate(text: &str) -> ValidationReport {
    let char_count = text.chars().count();

    let sentences: Vec<&str> = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    let repeated_sentences = if sentences.len() >= 3 {
        let unique: std::collections::HashSet<String> =
            sentences.iter().map(|s| s.to_lowercase()).collect();
        (unique.len() as f32 / sentences.len() as f32) < 0.6
    } else {
        false
    };

    let abrupt_ending = char_count > 60
        && !text
            .chars()
            .next_back()
            .is_some_and(|c| matches!(c, '.' | '!' | '?' | '…'));

    ValidationReport {
        empty: text.is_empty(),
        too_short: !text.is_empty() && char_count < 3,
        exceeds_platform_limit: char_count > PLATFORM_HARD_LIMIT,
        leftover_markup: text.contains(['*', '`', '~']) || text.contains("__"),
        abrupt_ending,
        repeated_sentences,
    }
}
