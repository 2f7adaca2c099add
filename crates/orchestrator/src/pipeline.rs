//! The orchestration pipeline.
//!
//! Composes the fingerprint engine and the compressor: fingerprint
//! everything, check the budget, decay fidelity with age, select by
//! importance and recency if still over, and manage the prompt-cache key.
//! Every consequential choice lands in the decision trace so callers can
//! audit what reached the model and why.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use promptloom_compress::{Compressor, Summarizer};
use promptloom_core::message::Message;
use promptloom_fingerprint::{
    FingerprintedMessage, SystemContextFingerprint, fingerprint_message,
    fingerprint_system_context,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::CacheKeyState;
use crate::config::OrchestratorConfig;

// ── Types ─────────────────────────────────────────────────────────────────

/// Token accounting per content category. All counts additive;
/// `reserve` is response headroom, never allocated to content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub system_prompt: usize,
    pub workspace_files: usize,
    pub conversation_history: usize,
    pub tool_results: usize,
    pub reserve: usize,
    pub total: usize,
}

/// What kind of decision was taken for a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    Include,
    Exclude,
    Compress,
    Summarize,
}

/// One entry in the ordered decision trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub reason: String,
    /// Token delta caused by this decision (negative = tokens saved).
    pub token_impact: i64,
}

/// Everything the caller needs to make the model call.
///
/// Callers MUST send `messages` (not their raw input) to the model, and
/// MUST forward `cache_key` to the provider's prompt-cache parameter when
/// it is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Final message list, in conversational order.
    pub messages: Vec<FingerprintedMessage>,
    /// The original system prompt, never mutated.
    pub system_prompt: String,
    pub budget: ContextBudget,
    /// Token estimate for what will actually be sent.
    pub actual_tokens: usize,
    pub compression_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
    pub decisions: Vec<Decision>,
}

// ── Orchestrator ──────────────────────────────────────────────────────────

/// The context orchestrator. Holds mutable cache-key state, so use one
/// instance per conversation — never share across sessions.
pub struct Orchestrator {
    config: OrchestratorConfig,
    compressor: Compressor,
    cache: Option<CacheKeyState>,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        let config = config.clamped();
        let compressor = Compressor::new(config.compression.clone());
        Self {
            config,
            compressor,
            cache: None,
        }
    }

    /// Build with an injected summarizer capability.
    pub fn with_summarizer(config: OrchestratorConfig, summarizer: Box<dyn Summarizer>) -> Self {
        let config = config.clamped();
        let compressor = Compressor::with_summarizer(config.compression.clone(), summarizer);
        Self {
            config,
            compressor,
            cache: None,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Orchestrate against the current wall clock.
    pub fn orchestrate(
        &mut self,
        system_prompt: &str,
        workspace_files: &BTreeMap<String, String>,
        messages: &[Message],
        model_id: &str,
    ) -> OrchestrationResult {
        self.orchestrate_at(Utc::now(), system_prompt, workspace_files, messages, model_id)
    }

    /// Orchestrate with an explicit clock. Deterministic given its inputs;
    /// this is the entry point tests and replay tooling use.
    pub fn orchestrate_at(
        &mut self,
        now: DateTime<Utc>,
        system_prompt: &str,
        workspace_files: &BTreeMap<String, String>,
        messages: &[Message],
        model_id: &str,
    ) -> OrchestrationResult {
        // 1. Fingerprint everything.
        let system_ctx = fingerprint_system_context(system_prompt, workspace_files);
        let mut fingerprinted: Vec<FingerprintedMessage> = messages
            .iter()
            .map(|m| fingerprint_message(m, None))
            .collect();

        // 2. Budget accounting.
        let budget = self.compute_budget(&system_ctx, &fingerprinted);
        let fixed_tokens = system_ctx.total_tokens();
        let message_tokens: usize = fingerprinted
            .iter()
            .map(|m| m.fingerprint.token_estimate)
            .sum();
        let total_current = fixed_tokens + message_tokens;

        let mut decisions: Vec<Decision> = Vec::new();
        let mut compression_applied = false;

        // 3–5. Compress and select only when over target.
        if total_current > self.config.target_context_tokens {
            compression_applied = true;

            // 4. Progressive age decay across the whole history.
            let batch = self.compressor.progressive_compress(
                &fingerprinted,
                &self.config.progressive_thresholds,
                now,
            );
            decisions.push(Decision {
                kind: DecisionKind::Compress,
                message_id: None,
                reason: format!("progressive decay over {} messages", batch.messages.len()),
                token_impact: batch.compressed_tokens as i64 - batch.original_tokens as i64,
            });
            for message in &batch.messages {
                if let Some(result) = batch.results.get(&message.id) {
                    if !result.metadata.summarized_sections.is_empty() {
                        decisions.push(Decision {
                            kind: DecisionKind::Summarize,
                            message_id: Some(message.id.clone()),
                            reason: "summarized during progressive decay".into(),
                            token_impact: result.compressed_tokens as i64
                                - result.original_tokens as i64,
                        });
                    }
                }
            }
            fingerprinted = batch.messages;

            // 5. Importance/recency selection if still over target.
            let remaining: usize = fingerprinted.iter().map(|m| m.effective_tokens()).sum();
            if fixed_tokens + remaining > self.config.target_context_tokens {
                let message_budget = self
                    .config
                    .target_context_tokens
                    .saturating_sub(fixed_tokens);
                fingerprinted = self.select_messages(fingerprinted, message_budget, &mut decisions);
            }
        }

        // 6. Prompt-cache key lifecycle.
        let cache_key = if self.config.enable_prompt_caching {
            Some(self.cache_key_for(&system_ctx.combined_hash, model_id, now))
        } else {
            None
        };

        // 7. Final token accounting.
        let actual_tokens: usize =
            fixed_tokens + fingerprinted.iter().map(|m| m.effective_tokens()).sum::<usize>();

        info!(
            model_id,
            total_current,
            actual_tokens,
            compression_applied,
            kept_messages = fingerprinted.len(),
            excluded = decisions
                .iter()
                .filter(|d| d.kind == DecisionKind::Exclude)
                .count(),
            "orchestration complete"
        );

        OrchestrationResult {
            messages: fingerprinted,
            system_prompt: system_prompt.to_string(),
            budget,
            actual_tokens,
            compression_applied,
            cache_key,
            decisions,
        }
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn compute_budget(
        &self,
        system_ctx: &SystemContextFingerprint,
        messages: &[FingerprintedMessage],
    ) -> ContextBudget {
        use promptloom_core::message::Role;

        let system_prompt = system_ctx.system_prompt.token_estimate;
        let workspace_files: usize = system_ctx
            .workspace_files
            .values()
            .map(|fp| fp.token_estimate)
            .sum();
        let (mut conversation_history, mut tool_results) = (0usize, 0usize);
        for message in messages {
            match message.role {
                Role::Tool => tool_results += message.fingerprint.token_estimate,
                _ => conversation_history += message.fingerprint.token_estimate,
            }
        }
        let reserve = self.config.reserve_tokens;
        ContextBudget {
            system_prompt,
            workspace_files,
            conversation_history,
            tool_results,
            reserve,
            total: system_prompt + workspace_files + conversation_history + tool_results + reserve,
        }
    }

    /// Keep the `preserve_recent` most recent messages unconditionally,
    /// then fill the remaining budget by importance (0.1-wide bands, ties
    /// broken by recency). Excluded messages land in the decision trace.
    /// The kept subset comes back in original conversational order.
    fn select_messages(
        &self,
        messages: Vec<FingerprintedMessage>,
        message_budget: usize,
        decisions: &mut Vec<Decision>,
    ) -> Vec<FingerprintedMessage> {
        let count = messages.len();
        let preserve = self.config.compression.preserve_recent.min(count);

        let mut by_recency: Vec<usize> = (0..count).collect();
        by_recency.sort_by_key(|&i| std::cmp::Reverse(messages[i].created_at));
        let preserved: HashSet<usize> = by_recency.iter().take(preserve).copied().collect();

        let mut kept = preserved.clone();
        let mut used: usize = preserved
            .iter()
            .map(|&i| messages[i].effective_tokens())
            .sum();

        for &i in by_recency.iter().take(preserve) {
            decisions.push(Decision {
                kind: DecisionKind::Include,
                message_id: Some(messages[i].id.clone()),
                reason: format!("within {preserve} most recent"),
                token_impact: messages[i].effective_tokens() as i64,
            });
        }

        // Importance bands of width 0.1; ties within a band resolved by
        // recency. Gives a total order, unlike raw float comparison.
        let mut candidates: Vec<usize> = (0..count).filter(|i| !preserved.contains(i)).collect();
        candidates.sort_by_key(|&i| {
            let band = (messages[i].fingerprint.importance * 10.0).floor() as i64;
            (std::cmp::Reverse(band), std::cmp::Reverse(messages[i].created_at))
        });

        for i in candidates {
            let tokens = messages[i].effective_tokens();
            if used + tokens <= message_budget {
                used += tokens;
                kept.insert(i);
                decisions.push(Decision {
                    kind: DecisionKind::Include,
                    message_id: Some(messages[i].id.clone()),
                    reason: format!(
                        "importance {:.2} fits budget",
                        messages[i].fingerprint.importance
                    ),
                    token_impact: tokens as i64,
                });
            } else {
                debug!(message_id = %messages[i].id, tokens, "excluding message");
                decisions.push(Decision {
                    kind: DecisionKind::Exclude,
                    message_id: Some(messages[i].id.clone()),
                    reason: format!(
                        "over budget (importance {:.2})",
                        messages[i].fingerprint.importance
                    ),
                    token_impact: -(tokens as i64),
                });
            }
        }

        messages
            .into_iter()
            .enumerate()
            .filter(|(i, _)| kept.contains(i))
            .map(|(_, m)| m)
            .collect()
    }

    fn cache_key_for(&mut self, combined_hash: &str, model_id: &str, now: DateTime<Utc>) -> String {
        if let Some(state) = &self.cache {
            if state.matches(combined_hash, model_id)
                && state.is_warm(now, self.config.cache_warmup_interval_mins)
            {
                debug!(key = %state.key, "reusing warm cache key");
                return state.key.clone();
            }
        }
        let state = CacheKeyState::mint(combined_hash, model_id, now);
        debug!(key = %state.key, "minted cache key");
        let key = state.key.clone();
        self.cache = Some(state);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloom_core::token::estimate_tokens;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(OrchestratorConfig::default())
    }

    fn message_of_tokens(tokens: usize) -> Message {
        Message::user("word ".repeat(tokens * 4 / 5))
    }

    #[test]
    fn budget_is_additive() {
        let mut orch = orchestrator();
        let mut files = BTreeMap::new();
        files.insert("notes.md".to_string(), "x".repeat(400)); // 100 tokens
        let messages = vec![Message::user("x".repeat(40)), Message::tool_result("y".repeat(80))];
        let result = orch.orchestrate(&"p".repeat(20), &files, &messages, "gemini-pro");
        let b = &result.budget;
        assert_eq!(b.system_prompt, 5);
        assert_eq!(b.workspace_files, 100);
        assert_eq!(b.conversation_history, 10);
        assert_eq!(b.tool_results, 20);
        assert_eq!(b.reserve, 10_000);
        assert_eq!(
            b.total,
            b.system_prompt + b.workspace_files + b.conversation_history + b.tool_results + b.reserve
        );
    }

    #[test]
    fn under_budget_returns_messages_verbatim() {
        let mut orch = orchestrator();
        let messages = vec![Message::user("Hi there"), Message::assistant("Hello!")];
        let result = orch.orchestrate("You are helpful", &BTreeMap::new(), &messages, "m");
        assert!(!result.compression_applied);
        assert_eq!(result.messages.len(), 2);
        for (input, output) in messages.iter().zip(&result.messages) {
            assert_eq!(input.content, output.effective_content());
        }
        assert_eq!(result.system_prompt, "You are helpful");
    }

    #[test]
    fn selection_preserves_recent_and_order() {
        let mut orch = Orchestrator::new(OrchestratorConfig {
            target_context_tokens: 3000,
            ..Default::default()
        });
        // 10 equal-importance ~500-token messages, oldest first.
        let messages: Vec<Message> = (0..10)
            .map(|i| message_of_tokens(500).aged_minutes(10 - i))
            .collect();
        let result = orch.orchestrate_at(
            Utc::now(),
            "prompt",
            &BTreeMap::new(),
            &messages,
            "m",
        );

        let kept_ids: Vec<&str> = result.messages.iter().map(|m| m.id.as_str()).collect();
        // The 5 most recent always survive.
        for msg in &messages[5..] {
            assert!(kept_ids.contains(&msg.id.as_str()), "recent message dropped");
        }
        // Conversational order is restored.
        let input_order: Vec<&str> = messages
            .iter()
            .map(|m| m.id.as_str())
            .filter(|id| kept_ids.contains(id))
            .collect();
        assert_eq!(kept_ids, input_order);
        // Something was excluded, and it is in the trace.
        assert!(
            result
                .decisions
                .iter()
                .any(|d| d.kind == DecisionKind::Exclude)
        );
    }

    #[test]
    fn reserve_is_never_allocated_to_content() {
        let mut orch = Orchestrator::new(OrchestratorConfig {
            target_context_tokens: 2000,
            reserve_tokens: 1900,
            ..Default::default()
        });
        let messages: Vec<Message> = (0..10).map(|_| message_of_tokens(300)).collect();
        let result = orch.orchestrate("p", &BTreeMap::new(), &messages, "m");
        // Selection targets target_context_tokens minus fixed cost, not
        // target minus reserve; reserve only appears in the budget report.
        assert!(result.actual_tokens <= 2000);
        assert_eq!(result.budget.reserve, 1900);
    }

    #[test]
    fn caching_disabled_yields_no_key() {
        let mut orch = Orchestrator::new(OrchestratorConfig {
            enable_prompt_caching: false,
            ..Default::default()
        });
        let result = orch.orchestrate("p", &BTreeMap::new(), &[], "m");
        assert!(result.cache_key.is_none());
    }

    #[test]
    fn empty_messages_zero_tokens() {
        let mut orch = orchestrator();
        let result = orch.orchestrate("", &BTreeMap::new(), &[], "m");
        assert_eq!(result.actual_tokens, 0);
        assert!(!result.compression_applied);
    }

    #[test]
    fn unknown_model_id_only_changes_key() {
        let mut orch = orchestrator();
        let now = Utc::now();
        let a = orch.orchestrate_at(now, "p", &BTreeMap::new(), &[], "model-a");
        let mut orch_b = orchestrator();
        let b = orch_b.orchestrate_at(now, "p", &BTreeMap::new(), &[], "no-such-model");
        assert_ne!(a.cache_key, b.cache_key);
        assert_eq!(a.actual_tokens, b.actual_tokens);
    }

    #[test]
    fn actual_tokens_uses_compressed_sizes() {
        let mut orch = Orchestrator::new(OrchestratorConfig {
            target_context_tokens: 1000,
            ..Default::default()
        });
        let messages: Vec<Message> = (0..4)
            .map(|_| message_of_tokens(500).aged_minutes(240))
            .collect();
        let result = orch.orchestrate_at(Utc::now(), "p", &BTreeMap::new(), &messages, "m");
        assert!(result.compression_applied);
        let recomputed: usize = result
            .messages
            .iter()
            .map(|m| estimate_tokens(m.effective_content()))
            .sum::<usize>()
            + estimate_tokens("p");
        assert_eq!(result.actual_tokens, recomputed);
    }
}
