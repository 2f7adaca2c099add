//! # PromptLoom Fingerprint
//!
//! Content fingerprinting: derives a stable identity (hash, token
//! estimate, importance, tags) for any text unit, detects changes and
//! duplicates, and maintains a running store across orchestration calls.
//!
//! Two hash widths are deliberate:
//!
//! - `ContextFingerprint::hash` is a **truncated** 16-hex digest — an
//!   approximate identity for duplicate detection and display, not
//!   collision-proof at that length.
//! - The system-context `combined_hash` (the identity used for prompt
//!   cache keying) is a **full** 64-hex SHA-256 over the sorted full
//!   content digests, where collisions would silently poison the
//!   provider-side cache.

pub mod engine;
pub mod store;

pub use engine::{
    ContextFingerprint, DuplicateGroup, FingerprintDelta, FingerprintOptions,
    FingerprintedMessage, SystemContextFingerprint, compare_fingerprints, content_digest,
    create_fingerprint, default_importance, find_duplicates, fingerprint_message,
    fingerprint_system_context,
};
pub use store::{FingerprintManager, FingerprintStore};
