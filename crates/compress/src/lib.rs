//! # PromptLoom Compress
//!
//! Reduces the token footprint of one message or a batch of messages,
//! selecting a strategy by role, structure, and importance:
//!
//! | Strategy | When | Loss |
//! |----------|------|------|
//! | none | already within target | lossless |
//! | trim | high-importance content (head + tail kept) | low |
//! | semantic | tool results (structural JSON / log collapse) | medium |
//! | summarize | everything else, via the injected [`Summarizer`] | medium |
//! | progressive | age-tiered decay across a batch | varies |
//!
//! Compression never mutates original content — it produces an overlay on
//! [`FingerprintedMessage`] plus a [`CompressionResult`] describing what
//! was kept, removed, and summarized.

pub mod compressor;
pub mod summarizer;
pub mod types;

pub use compressor::{BatchCompression, Compressor};
pub use summarizer::{Summarizer, TruncatingSummarizer};
pub use types::{
    AgeThreshold, CompressionConfig, CompressionMetadata, CompressionMethod, CompressionResult,
    LossLevel, default_thresholds,
};

pub use promptloom_fingerprint::FingerprintedMessage;
