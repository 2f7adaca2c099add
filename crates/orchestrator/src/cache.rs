//! Prompt-cache key lifecycle.
//!
//! A cache key identifies the static context (system prompt + workspace
//! files) for a given model, so the provider-side prompt cache can be
//! reused across calls. Identity is a structured `{combined_hash,
//! model_id}` comparison — never a string-prefix check — and the minting
//! timestamp is part of the hashed material so a key re-minted after the
//! warmup window expires differs even when the context is unchanged.

use chrono::{DateTime, Utc};
use promptloom_fingerprint::content_digest;
use serde::{Deserialize, Serialize};

/// The currently minted cache key and the identity it was minted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheKeyState {
    /// Combined system-context hash the key was minted against.
    pub combined_hash: String,
    /// Model the key was minted for.
    pub model_id: String,
    /// The key handed to the provider.
    pub key: String,
    /// When the key was minted.
    pub minted_at: DateTime<Utc>,
}

impl CacheKeyState {
    /// Mint a fresh key for the given identity.
    pub fn mint(combined_hash: &str, model_id: &str, now: DateTime<Utc>) -> Self {
        let key = content_digest(&format!(
            "{combined_hash}-{model_id}-{}",
            now.timestamp_millis()
        ));
        Self {
            combined_hash: combined_hash.to_string(),
            model_id: model_id.to_string(),
            key,
            minted_at: now,
        }
    }

    /// Whether this key was minted for the given identity.
    pub fn matches(&self, combined_hash: &str, model_id: &str) -> bool {
        self.combined_hash == combined_hash && self.model_id == model_id
    }

    /// Whether the key is still inside the provider's cache warmup window.
    pub fn is_warm(&self, now: DateTime<Utc>, warmup_interval_mins: u64) -> bool {
        let age = now - self.minted_at;
        age >= chrono::Duration::zero() && age.num_minutes() < warmup_interval_mins as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_produces_full_width_key() {
        let state = CacheKeyState::mint("abc", "gemini-pro", Utc::now());
        assert_eq!(state.key.len(), 64);
    }

    #[test]
    fn remint_later_differs() {
        let now = Utc::now();
        let a = CacheKeyState::mint("abc", "gemini-pro", now);
        let b = CacheKeyState::mint("abc", "gemini-pro", now + chrono::Duration::minutes(60));
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn identity_is_structured() {
        let state = CacheKeyState::mint("abc", "gemini-pro", Utc::now());
        assert!(state.matches("abc", "gemini-pro"));
        assert!(!state.matches("abc", "gemini-pro-vision"));
        assert!(!state.matches("abcd", "gemini-pro"));
    }

    #[test]
    fn warm_inside_window_cold_outside() {
        let minted = Utc::now();
        let state = CacheKeyState::mint("abc", "m", minted);
        assert!(state.is_warm(minted + chrono::Duration::minutes(54), 55));
        assert!(!state.is_warm(minted + chrono::Duration::minutes(55), 55));
    }

    #[test]
    fn clock_skew_is_cold() {
        let minted = Utc::now();
        let state = CacheKeyState::mint("abc", "m", minted);
        assert!(!state.is_warm(minted - chrono::Duration::minutes(1), 55));
    }
}
