//! Compression value objects and configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which strategy produced a compression result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    /// Content was already within budget.
    None,
    /// Duplicate content elided.
    Dedup,
    /// Head + tail kept, middle removed.
    Trim,
    /// Delegated to the injected summarizer.
    Summarize,
    /// Structure-aware tool-result compression.
    Semantic,
    /// Age-tiered batch decay.
    Progressive,
}

/// How much information a compression step may have discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LossLevel {
    Lossless,
    Low,
    Medium,
    High,
}

/// Bookkeeping attached to every compression result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionMetadata {
    /// Labels for the sections that survived.
    pub preserved_sections: Vec<String>,
    /// Labels for the sections that were removed outright.
    pub removed_sections: Vec<String>,
    /// Labels for the sections replaced by a summary.
    pub summarized_sections: Vec<String>,
    /// Original content length in characters.
    pub original_length: usize,
    /// Compressed content length in characters.
    pub compressed_length: usize,
    /// When the compression ran.
    pub timestamp: DateTime<Utc>,
}

/// The outcome of compressing one message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionResult {
    pub original_tokens: usize,
    pub compressed_tokens: usize,
    /// `compressed_tokens / original_tokens`; 1.0 for a no-op.
    pub compression_ratio: f64,
    pub method: CompressionMethod,
    pub loss: LossLevel,
    pub compressed_content: String,
    pub metadata: CompressionMetadata,
}

/// One rung of the progressive-decay ladder.
///
/// `max_age_minutes: None` is the unbounded final rung.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeThreshold {
    pub max_age_minutes: Option<u64>,
    pub level: u8,
}

/// Default decay ladder: 0–5 min untouched, then one level per tier,
/// anything older than 3 hours at the maximum level.
pub fn default_thresholds() -> Vec<AgeThreshold> {
    vec![
        AgeThreshold {
            max_age_minutes: Some(5),
            level: 0,
        },
        AgeThreshold {
            max_age_minutes: Some(30),
            level: 1,
        },
        AgeThreshold {
            max_age_minutes: Some(60),
            level: 2,
        },
        AgeThreshold {
            max_age_minutes: Some(180),
            level: 3,
        },
        AgeThreshold {
            max_age_minutes: None,
            level: 4,
        },
    ]
}

/// Compressor tuning knobs. Merged over defaults via serde.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    /// Hard ceiling for batch allocation.
    #[serde(default = "default_max_token_budget")]
    pub max_token_budget: usize,

    /// Default per-message target when no explicit target is given.
    #[serde(default = "default_target_compression_ratio")]
    pub target_compression_ratio: f64,

    /// Messages never dropped by selection, counted from the end.
    #[serde(default = "default_preserve_recent")]
    pub preserve_recent: usize,

    /// Importance at or above which content is trimmed rather than
    /// summarized or structurally compressed.
    #[serde(default = "default_preserve_importance")]
    pub preserve_importance: f64,

    /// Whether the summarizer capability is consulted at all.
    #[serde(default = "default_true")]
    pub enable_summarization: bool,

    /// Whether tool results get structure-aware compression.
    #[serde(default = "default_true")]
    pub enable_semantic: bool,
}

fn default_max_token_budget() -> usize {
    100_000
}
fn default_target_compression_ratio() -> f64 {
    0.5
}
fn default_preserve_recent() -> usize {
    5
}
fn default_preserve_importance() -> f64 {
    0.8
}
fn default_true() -> bool {
    true
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_token_budget: default_max_token_budget(),
            target_compression_ratio: default_target_compression_ratio(),
            preserve_recent: default_preserve_recent(),
            preserve_importance: default_preserve_importance(),
            enable_summarization: true,
            enable_semantic: true,
        }
    }
}

impl CompressionConfig {
    /// Clamp out-of-range values instead of rejecting them.
    pub fn clamped(mut self) -> Self {
        self.target_compression_ratio = self.target_compression_ratio.clamp(0.0, 1.0);
        self.preserve_importance = self.preserve_importance.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let cfg = CompressionConfig::default();
        assert_eq!(cfg.max_token_budget, 100_000);
        assert_eq!(cfg.target_compression_ratio, 0.5);
        assert_eq!(cfg.preserve_recent, 5);
        assert_eq!(cfg.preserve_importance, 0.8);
        assert!(cfg.enable_summarization);
        assert!(cfg.enable_semantic);
    }

    #[test]
    fn empty_toml_table_yields_defaults() {
        let cfg: CompressionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.preserve_recent, 5);
    }

    #[test]
    fn clamped_bounds_ratios() {
        let cfg = CompressionConfig {
            target_compression_ratio: 1.7,
            preserve_importance: -0.2,
            ..Default::default()
        }
        .clamped();
        assert_eq!(cfg.target_compression_ratio, 1.0);
        assert_eq!(cfg.preserve_importance, 0.0);
    }

    #[test]
    fn default_ladder_shape() {
        let ladder = default_thresholds();
        assert_eq!(ladder.len(), 5);
        assert_eq!(ladder[0].max_age_minutes, Some(5));
        assert_eq!(ladder[4].max_age_minutes, None);
        assert_eq!(ladder[4].level, 4);
    }
}
