//! # PromptLoom Orchestrator
//!
//! The top of the engine: decides what subset and what fidelity of a
//! conversation fits the model's context window, and manages the
//! prompt-cache key so repeated static context is reused provider-side.
//!
//! ```
//! use std::collections::BTreeMap;
//! use promptloom_core::Message;
//! use promptloom_orchestrator::{Orchestrator, OrchestratorConfig};
//!
//! let mut orch = Orchestrator::new(OrchestratorConfig::default());
//! let messages = vec![Message::user("What's the weather in Hanoi?")];
//! let result = orch.orchestrate("You are helpful", &BTreeMap::new(), &messages, "gemini-pro");
//!
//! assert!(!result.compression_applied);
//! assert!(result.cache_key.is_some());
//! ```
//!
//! One orchestrator per conversation: the cache-key state is mutated in
//! place per call, which makes a shared instance unsafe across sessions.

pub mod cache;
pub mod config;
pub mod pipeline;

pub use cache::CacheKeyState;
pub use config::OrchestratorConfig;
pub use pipeline::{
    ContextBudget, Decision, DecisionKind, OrchestrationResult, Orchestrator,
};
