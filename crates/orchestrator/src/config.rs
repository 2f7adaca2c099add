//! Orchestrator configuration.
//!
//! Every field is serde-defaulted, so a partial TOML table (or an empty
//! one) merges over the documented defaults. Out-of-range values are
//! clamped at construction rather than rejected: the engine's contract is
//! that normal operation never errors.

use promptloom_compress::{AgeThreshold, CompressionConfig, default_thresholds};
use promptloom_core::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Hard model context ceiling, for visibility only.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// The budget orchestration actually targets. Must not exceed
    /// `max_context_tokens`; clamped if it does.
    #[serde(default = "default_target_context_tokens")]
    pub target_context_tokens: usize,

    /// Response headroom. Never allocated to content.
    #[serde(default = "default_reserve_tokens")]
    pub reserve_tokens: usize,

    /// Compressor tuning.
    #[serde(default)]
    pub compression: CompressionConfig,

    /// Age ladder for progressive decay.
    #[serde(default = "default_thresholds")]
    pub progressive_thresholds: Vec<AgeThreshold>,

    /// Whether to mint and reuse prompt-cache keys.
    #[serde(default = "default_true")]
    pub enable_prompt_caching: bool,

    /// How long a minted cache key stays reusable, in minutes.
    #[serde(default = "default_cache_warmup_interval")]
    pub cache_warmup_interval_mins: u64,
}

fn default_max_context_tokens() -> usize {
    200_000
}
fn default_target_context_tokens() -> usize {
    150_000
}
fn default_reserve_tokens() -> usize {
    10_000
}
fn default_cache_warmup_interval() -> u64 {
    55
}
fn default_true() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            target_context_tokens: default_target_context_tokens(),
            reserve_tokens: default_reserve_tokens(),
            compression: CompressionConfig::default(),
            progressive_thresholds: default_thresholds(),
            enable_prompt_caching: true,
            cache_warmup_interval_mins: default_cache_warmup_interval(),
        }
    }
}

impl OrchestratorConfig {
    /// Parse a TOML fragment, merging missing fields over defaults.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        Ok(config.clamped())
    }

    /// Clamp out-of-range values into their documented domains.
    pub fn clamped(mut self) -> Self {
        self.compression = self.compression.clamped();
        if self.target_context_tokens > self.max_context_tokens {
            self.target_context_tokens = self.max_context_tokens;
        }
        self
    }
}
