//! The compressor: per-message strategy ladder, importance-weighted batch
//! allocation, and age-tiered progressive decay.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use promptloom_core::message::Role;
use promptloom_core::token::{CHARS_PER_TOKEN, estimate_tokens};
use promptloom_fingerprint::FingerprintedMessage;
use serde_json::Value;
use tracing::debug;

use crate::summarizer::{Summarizer, TruncatingSummarizer};
use crate::types::{
    AgeThreshold, CompressionConfig, CompressionMetadata, CompressionMethod, CompressionResult,
    LossLevel,
};

/// Floor allocation per message in a batch, so no message is starved to
/// nothing.
const MIN_MESSAGE_BUDGET: usize = 100;

/// Recursion limit for structural JSON summarization.
const MAX_JSON_DEPTH: usize = 2;
/// Arrays longer than this collapse to [first, marker, last].
const ARRAY_KEEP: usize = 3;
/// Objects keep this many keys before the rest collapse to a marker.
const OBJECT_KEY_KEEP: usize = 5;
/// Strings longer than this (in chars) are truncated inside JSON.
const STRING_MAX: usize = 100;

const TRIM_MARKER: &str = "\n... [trimmed] ...\n";

/// The outcome of compressing a batch of messages.
#[derive(Debug, Clone)]
pub struct BatchCompression {
    /// Messages in input order, compressed where warranted.
    pub messages: Vec<FingerprintedMessage>,
    /// Per-message results, keyed by message id.
    pub results: HashMap<String, CompressionResult>,
    /// Token total before compression.
    pub original_tokens: usize,
    /// Token total after compression.
    pub compressed_tokens: usize,
}

/// Strategy-selecting message compressor.
pub struct Compressor {
    config: CompressionConfig,
    summarizer: Box<dyn Summarizer>,
}

impl Compressor {
    /// Create a compressor with the default (truncating) summarizer.
    pub fn new(config: CompressionConfig) -> Self {
        Self::with_summarizer(config, Box::new(TruncatingSummarizer))
    }

    /// Create a compressor with an injected summarizer capability.
    pub fn with_summarizer(config: CompressionConfig, summarizer: Box<dyn Summarizer>) -> Self {
        Self {
            config: config.clamped(),
            summarizer,
        }
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    // ── Single message ────────────────────────────────────────────────────

    /// Compress one message toward `target_tokens` (defaults to the
    /// configured target ratio of its current size).
    ///
    /// Strategy ladder:
    /// 1. already within target → no-op
    /// 2. importance ≥ `preserve_importance` → head/tail trim
    /// 3. tool role (semantic enabled) → structural compression
    /// 4. otherwise → summarizer if enabled, else trim
    pub fn compress_message(
        &self,
        message: &FingerprintedMessage,
        target_tokens: Option<usize>,
    ) -> (FingerprintedMessage, CompressionResult) {
        let original_tokens = message.fingerprint.token_estimate;
        let target = target_tokens.unwrap_or_else(|| {
            (original_tokens as f64 * self.config.target_compression_ratio).ceil() as usize
        });

        if original_tokens <= target {
            return (message.clone(), self.noop_result(message, original_tokens));
        }

        let (content, method, loss, preserved, removed, summarized) =
            if message.fingerprint.importance >= self.config.preserve_importance {
                let trimmed = trim(&message.content, target);
                (
                    trimmed,
                    CompressionMethod::Trim,
                    LossLevel::Low,
                    vec!["head".into(), "tail".into()],
                    vec!["middle".into()],
                    Vec::new(),
                )
            } else if message.role == Role::Tool && self.config.enable_semantic {
                let (content, preserved, removed, summarized) =
                    self.compress_tool_result(&message.content, target);
                (
                    content,
                    CompressionMethod::Semantic,
                    LossLevel::Medium,
                    preserved,
                    removed,
                    summarized,
                )
            } else if self.config.enable_summarization {
                (
                    self.summarizer.summarize(&message.content, target),
                    CompressionMethod::Summarize,
                    LossLevel::Medium,
                    Vec::new(),
                    Vec::new(),
                    vec!["body".into()],
                )
            } else {
                (
                    trim(&message.content, target),
                    CompressionMethod::Trim,
                    LossLevel::Low,
                    vec!["head".into(), "tail".into()],
                    vec!["middle".into()],
                    Vec::new(),
                )
            };

        // Summary scaffolding (markers, key lists) can outgrow a tiny
        // original; hard-truncate in that case so compression is monotonic.
        let content = if estimate_tokens(&content) > original_tokens {
            take_chars(&message.content, target * CHARS_PER_TOKEN).to_string()
        } else {
            content
        };

        let compressed_tokens = estimate_tokens(&content);
        let ratio = compressed_tokens as f64 / original_tokens as f64;
        debug!(
            message_id = %message.id,
            ?method,
            original_tokens,
            compressed_tokens,
            "compressed message"
        );

        let result = CompressionResult {
            original_tokens,
            compressed_tokens,
            compression_ratio: ratio,
            method,
            loss,
            compressed_content: content.clone(),
            metadata: CompressionMetadata {
                preserved_sections: preserved,
                removed_sections: removed,
                summarized_sections: summarized,
                original_length: message.content.len(),
                compressed_length: content.len(),
                timestamp: Utc::now(),
            },
        };

        let mut compressed = message.clone();
        compressed.compressed_content = Some(content);
        compressed.compression_ratio = Some(ratio);
        (compressed, result)
    }

    // ── Batch ─────────────────────────────────────────────────────────────

    /// Compress a batch so it fits `token_budget`, allocating each message
    /// a share of the budget proportional to its importance (with a
    /// 100-token floor so no message starves).
    pub fn compress_batch(
        &self,
        messages: &[FingerprintedMessage],
        token_budget: usize,
    ) -> BatchCompression {
        let budget = token_budget.min(self.config.max_token_budget);
        let original_tokens: usize = messages
            .iter()
            .map(|m| m.fingerprint.token_estimate)
            .sum();

        if original_tokens <= budget {
            return BatchCompression {
                messages: messages.to_vec(),
                results: HashMap::new(),
                original_tokens,
                compressed_tokens: original_tokens,
            };
        }

        let total_importance: f64 = messages.iter().map(|m| m.fingerprint.importance).sum();

        let mut out = Vec::with_capacity(messages.len());
        let mut results = HashMap::with_capacity(messages.len());
        for message in messages {
            let allocation = if total_importance <= 0.0 {
                MIN_MESSAGE_BUDGET
            } else {
                let share = message.fingerprint.importance / total_importance;
                ((budget as f64 * share).floor() as usize).max(MIN_MESSAGE_BUDGET)
            };
            let (compressed, result) = self.compress_message(message, Some(allocation));
            results.insert(compressed.id.clone(), result);
            out.push(compressed);
        }

        let compressed_tokens = out.iter().map(|m| m.effective_tokens()).sum();
        BatchCompression {
            messages: out,
            results,
            original_tokens,
            compressed_tokens,
        }
    }

    // ── Progressive decay ─────────────────────────────────────────────────

    /// Age-tiered fidelity decay: older messages compress harder instead
    /// of being dropped outright.
    ///
    /// Each message's age (relative to `now`) selects a rung on the
    /// threshold ladder; the rung's level sets the target ratio
    /// `1 − level × 0.2`, and the message is compressed toward that ratio
    /// through the normal strategy ladder.
    pub fn progressive_compress(
        &self,
        messages: &[FingerprintedMessage],
        thresholds: &[AgeThreshold],
        now: DateTime<Utc>,
    ) -> BatchCompression {
        let mut ladder = thresholds.to_vec();
        ladder.sort_by_key(|t| t.max_age_minutes.unwrap_or(u64::MAX));

        let original_tokens: usize = messages
            .iter()
            .map(|m| m.fingerprint.token_estimate)
            .sum();

        let mut out = Vec::with_capacity(messages.len());
        let mut results = HashMap::with_capacity(messages.len());
        for message in messages {
            let age_minutes = (now - message.created_at).num_minutes().max(0) as u64;
            let level = ladder
                .iter()
                .find(|t| t.max_age_minutes.is_none_or(|max| age_minutes <= max))
                .map(|t| t.level)
                .unwrap_or(0);

            if level == 0 {
                results.insert(
                    message.id.clone(),
                    self.noop_result(message, message.fingerprint.token_estimate),
                );
                out.push(message.clone());
                continue;
            }

            let target_ratio = (1.0 - f64::from(level) * 0.2).max(0.0);
            let target =
                (message.fingerprint.token_estimate as f64 * target_ratio).ceil() as usize;
            let (compressed, mut result) = self.compress_message(message, Some(target));
            if result.method != CompressionMethod::None {
                result.method = CompressionMethod::Progressive;
            }
            debug!(
                message_id = %message.id,
                age_minutes,
                level,
                target_ratio,
                "progressive decay"
            );
            results.insert(compressed.id.clone(), result);
            out.push(compressed);
        }

        let compressed_tokens = out.iter().map(|m| m.effective_tokens()).sum();
        BatchCompression {
            messages: out,
            results,
            original_tokens,
            compressed_tokens,
        }
    }

    // ── Strategies ────────────────────────────────────────────────────────

    /// Structure-aware compression for tool output.
    ///
    /// Valid JSON gets a recursive structural summary; if the summary
    /// still exceeds the budget it collapses to a one-line key inventory.
    /// Multi-line plain text keeps its first and last ten lines. Anything
    /// else falls back to a head/tail trim. Returns
    /// (content, preserved, removed, summarized) section labels.
    fn compress_tool_result(
        &self,
        content: &str,
        target_tokens: usize,
    ) -> (String, Vec<String>, Vec<String>, Vec<String>) {
        // Parse failure simply means "not JSON" — never an error.
        if let Ok(value) = serde_json::from_str::<Value>(content) {
            let summarized = summarize_json(&value, 0);
            let rendered = serde_json::to_string(&summarized).unwrap_or_default();
            if !rendered.is_empty() && estimate_tokens(&rendered) <= target_tokens {
                return (
                    rendered,
                    vec!["structure".into()],
                    Vec::new(),
                    vec!["json".into()],
                );
            }
            return (
                bracket_summary(&value),
                Vec::new(),
                vec!["values".into()],
                vec!["json".into()],
            );
        }

        let lines: Vec<&str> = content.lines().collect();
        if lines.len() > 20 {
            let omitted = lines.len() - 20;
            let mut kept: Vec<&str> = Vec::with_capacity(21);
            kept.extend(&lines[..10]);
            let marker = format!("... [{omitted} lines omitted] ...");
            kept.push(&marker);
            kept.extend(&lines[lines.len() - 10..]);
            return (
                kept.join("\n"),
                vec!["first 10 lines".into(), "last 10 lines".into()],
                vec![format!("{omitted} middle lines")],
                Vec::new(),
            );
        }

        (
            trim(content, target_tokens),
            vec!["head".into(), "tail".into()],
            vec!["middle".into()],
            Vec::new(),
        )
    }

    fn noop_result(&self, message: &FingerprintedMessage, tokens: usize) -> CompressionResult {
        CompressionResult {
            original_tokens: tokens,
            compressed_tokens: tokens,
            compression_ratio: 1.0,
            method: CompressionMethod::None,
            loss: LossLevel::Lossless,
            compressed_content: message.content.clone(),
            metadata: CompressionMetadata {
                preserved_sections: vec!["all".into()],
                removed_sections: Vec::new(),
                summarized_sections: Vec::new(),
                original_length: message.content.len(),
                compressed_length: message.content.len(),
                timestamp: Utc::now(),
            },
        }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(CompressionConfig::default())
    }
}

// ── Free helpers ──────────────────────────────────────────────────────────

/// Head/tail trim: keep 40% of the target character budget from each end
/// with an ellipsis marker between.
fn trim(content: &str, target_tokens: usize) -> String {
    let budget_chars = target_tokens * CHARS_PER_TOKEN;
    let keep = budget_chars * 2 / 5;
    let total_chars = content.chars().count();

    if keep == 0 || keep * 2 + TRIM_MARKER.chars().count() >= total_chars {
        return take_chars(content, budget_chars).to_string();
    }

    let head = take_chars(content, keep);
    let tail = take_last_chars(content, keep, total_chars);
    format!("{head}{TRIM_MARKER}{tail}")
}

/// First `n` chars of `s`, on a char boundary.
fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Last `n` chars of `s`. `total_chars` is the precomputed char count.
fn take_last_chars(s: &str, n: usize, total_chars: usize) -> &str {
    if total_chars <= n {
        return s;
    }
    match s.char_indices().nth(total_chars - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// Recursive structural summary of a JSON value, bounded at
/// [`MAX_JSON_DEPTH`].
fn summarize_json(value: &Value, depth: usize) -> Value {
    match value {
        Value::String(s) if s.chars().count() > STRING_MAX => {
            let head: String = s.chars().take(STRING_MAX).collect();
            Value::String(format!("{head}..."))
        }
        Value::Array(items) => {
            if depth >= MAX_JSON_DEPTH {
                return Value::String(format!("[{} items]", items.len()));
            }
            if items.len() > ARRAY_KEEP {
                let first = summarize_json(&items[0], depth + 1);
                let last = summarize_json(&items[items.len() - 1], depth + 1);
                Value::Array(vec![
                    first,
                    Value::String(format!("...{} more...", items.len() - 2)),
                    last,
                ])
            } else {
                Value::Array(items.iter().map(|v| summarize_json(v, depth + 1)).collect())
            }
        }
        Value::Object(map) => {
            if depth >= MAX_JSON_DEPTH {
                return Value::String(format!("{{{} keys}}", map.len()));
            }
            let mut out = serde_json::Map::new();
            for (key, val) in map.iter().take(OBJECT_KEY_KEEP) {
                out.insert(key.clone(), summarize_json(val, depth + 1));
            }
            if map.len() > OBJECT_KEY_KEEP {
                out.insert(
                    "...".to_string(),
                    Value::String(format!("{} more keys", map.len() - OBJECT_KEY_KEEP)),
                );
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// One-line inventory of a JSON value for when even the structural
/// summary is over budget.
fn bracket_summary(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let shown: Vec<&str> = map.keys().take(OBJECT_KEY_KEEP).map(String::as_str).collect();
            let suffix = if map.len() > OBJECT_KEY_KEEP { ", ..." } else { "" };
            format!("{} keys: {}{}", map.len(), shown.join(", "), suffix)
        }
        Value::Array(items) => format!("{} items", items.len()),
        other => {
            let rendered = other.to_string();
            take_chars(&rendered, STRING_MAX).to_string()
        }
    }
}
