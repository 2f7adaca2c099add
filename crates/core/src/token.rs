//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, rounded up.
//! This approximation is accurate within ~10% for BPE tokenizers
//! (GPT-4, Claude, Gemini) on English text. The heuristic sits behind the
//! [`TokenEstimator`] trait so a real tokenizer can be substituted without
//! changing any other contract in the engine.

use crate::message::Message;

/// Characters per token for the default heuristic.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimates the token count of a piece of text.
///
/// Implementations must be deterministic and return 0 for empty input.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// The default character-count heuristic: 1 token ≈ 4 characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate tokens for a single message's content.
pub fn estimate_message_tokens(message: &Message) -> usize {
    estimate_tokens(&message.content)
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
