//! Error types for the PromptLoom domain.
//!
//! Uses `thiserror` for ergonomic error definitions. Each bounded context
//! has its own error variant. Note that the orchestration pipeline itself
//! never errors in normal operation — malformed tool JSON, empty content,
//! and unknown model ids are all absorbed (see the compressor and
//! orchestrator crates). Errors exist only at the edges: configuration
//! loading and fingerprint-store export/import.

use thiserror::Error;

/// The top-level error type for all PromptLoom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Fingerprint store errors ---
    #[error("Fingerprint store error: {0}")]
    Store(#[from] StoreError),

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Import failed: {0}")]
    ImportFailed(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),
}
