//! The summarization capability.
//!
//! Summarization is an injectable strategy, not a hardcoded behavior: the
//! compressor holds a `Box<dyn Summarizer>` and an LLM-backed
//! implementation can be swapped in without touching the strategy ladder.
//! The shipped default is deliberately trivial — it truncates to the
//! character budget — because this engine makes no model calls of its own.

use promptloom_core::token::CHARS_PER_TOKEN;

/// Produces a shorter rendition of `content` aimed at `target_tokens`.
///
/// Implementations must be pure: no I/O from inside the engine. An async
/// LLM-backed summarizer belongs in the caller, feeding its output back
/// in through this trait.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, content: &str, target_tokens: usize) -> String;
}

/// Default summarizer: keeps the head of the content up to the character
/// budget and appends an ellipsis marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruncatingSummarizer;

const MARKER: &str = " ...";

impl Summarizer for TruncatingSummarizer {
    fn summarize(&self, content: &str, target_tokens: usize) -> String {
        let budget_chars = (target_tokens * CHARS_PER_TOKEN).saturating_sub(MARKER.len());
        if content.chars().count() <= budget_chars {
            return content.to_string();
        }
        let head: String = content.chars().take(budget_chars).collect();
        format!("{head}{MARKER}")
    }
}
