//! # PromptLoom Core
//!
//! Domain types and error definitions for the PromptLoom context
//! intelligence engine. This crate has **zero framework dependencies** —
//! it defines the value objects that the fingerprint, compress, and
//! orchestrator crates all build against.
//!
//! ## Design Philosophy
//!
//! The engine is a pure library: no I/O, no network, no async. Every
//! extension seam (token estimation, summarization) lives behind a trait,
//! so callers can swap implementations without touching the orchestration
//! algorithm.

pub mod error;
pub mod message;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use token::{HeuristicEstimator, TokenEstimator, estimate_tokens};
