//! The fingerprint engine: content digests, per-message fingerprints,
//! system-context identity, comparison, and duplicate detection.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use promptloom_core::message::{Message, Role};
use promptloom_core::token::estimate_tokens;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of the truncated hash kept on a fingerprint.
pub const SHORT_HASH_LEN: usize = 16;

/// Compute the full hex-encoded SHA-256 digest of a piece of content.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn short_hash(content: &str) -> String {
    let mut digest = content_digest(content);
    digest.truncate(SHORT_HASH_LEN);
    digest
}

// ── Types ─────────────────────────────────────────────────────────────────

/// Content-derived identity for a text unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextFingerprint {
    /// Truncated content digest. Approximate identity only.
    pub hash: String,
    /// Monotonic version counter, bumped on every re-fingerprint.
    pub version: u64,
    /// When this fingerprint was taken.
    pub created_at: DateTime<Utc>,
    /// Heuristic token estimate for the content.
    pub token_estimate: usize,
    /// Priority score in [0, 1].
    pub importance: f64,
    /// Free-form labels.
    pub tags: BTreeSet<String>,
}

/// Options for [`create_fingerprint`].
#[derive(Debug, Clone, Default)]
pub struct FingerprintOptions {
    /// Priority score; clamped into [0, 1]. Defaults to 0.5.
    pub importance: Option<f64>,
    /// Labels to attach.
    pub tags: BTreeSet<String>,
    /// Version of the fingerprint being replaced, if any.
    pub existing_version: Option<u64>,
}

/// A message annotated with its fingerprint and optional compression overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintedMessage {
    pub id: String,
    pub role: Role,
    /// Original content. Never mutated; compression is an overlay.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub fingerprint: ContextFingerprint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
}

impl FingerprintedMessage {
    /// The content that should actually be sent to the model.
    pub fn effective_content(&self) -> &str {
        self.compressed_content.as_deref().unwrap_or(&self.content)
    }

    /// Token estimate for the effective content.
    pub fn effective_tokens(&self) -> usize {
        match &self.compressed_content {
            Some(c) => estimate_tokens(c),
            None => self.fingerprint.token_estimate,
        }
    }
}

/// Fingerprints for the static part of the context: system prompt plus
/// workspace files, with a combined order-independent identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemContextFingerprint {
    pub system_prompt: ContextFingerprint,
    pub workspace_files: BTreeMap<String, ContextFingerprint>,
    /// Full-width digest over the sorted content digests of prompt and
    /// files. This is the identity used for prompt-cache keying.
    pub combined_hash: String,
}

impl SystemContextFingerprint {
    /// Token estimate for the entire static context.
    pub fn total_tokens(&self) -> usize {
        self.system_prompt.token_estimate
            + self
                .workspace_files
                .values()
                .map(|f| f.token_estimate)
                .sum::<usize>()
    }
}

/// Result of comparing two fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintDelta {
    /// Whether the content hash differs. Either side absent counts as changed.
    pub changed: bool,
    /// `b.token_estimate - a.token_estimate` (absent side treated as 0).
    pub token_delta: i64,
    /// `b.version - a.version` (absent side treated as 0).
    pub version_delta: i64,
}

/// A group of messages sharing identical content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub hash: String,
    pub message_ids: Vec<String>,
}

// ── Operations ────────────────────────────────────────────────────────────

/// Create a fingerprint for a piece of content.
pub fn create_fingerprint(content: &str, opts: FingerprintOptions) -> ContextFingerprint {
    ContextFingerprint {
        hash: short_hash(content),
        version: opts.existing_version.unwrap_or(0) + 1,
        created_at: Utc::now(),
        token_estimate: estimate_tokens(content),
        importance: opts.importance.unwrap_or(0.5).clamp(0.0, 1.0),
        tags: opts.tags,
    }
}

/// Default importance for a message, by role.
pub fn default_importance(role: Role) -> f64 {
    match role {
        Role::System => 0.9,
        Role::User => 0.7,
        Role::Assistant => 0.6,
        Role::Tool => 0.3,
    }
}

/// Fingerprint a single message, deriving importance from its role unless
/// overridden.
pub fn fingerprint_message(message: &Message, importance: Option<f64>) -> FingerprintedMessage {
    let fingerprint = create_fingerprint(
        &message.content,
        FingerprintOptions {
            importance: Some(importance.unwrap_or_else(|| default_importance(message.role))),
            ..Default::default()
        },
    );
    FingerprintedMessage {
        id: message.id.clone(),
        role: message.role,
        content: message.content.clone(),
        created_at: message.created_at,
        fingerprint,
        compressed_content: None,
        compression_ratio: None,
    }
}

/// Fingerprint the static context: system prompt (importance 1.0) and each
/// workspace file (importance 0.8).
///
/// The combined hash is computed over the *sorted* list of full content
/// digests, so it is independent of file-map iteration order.
pub fn fingerprint_system_context(
    system_prompt: &str,
    workspace_files: &BTreeMap<String, String>,
) -> SystemContextFingerprint {
    let prompt_fp = create_fingerprint(
        system_prompt,
        FingerprintOptions {
            importance: Some(1.0),
            ..Default::default()
        },
    );

    let mut digests = vec![content_digest(system_prompt)];
    let mut files = BTreeMap::new();
    for (path, content) in workspace_files {
        digests.push(content_digest(content));
        files.insert(
            path.clone(),
            create_fingerprint(
                content,
                FingerprintOptions {
                    importance: Some(0.8),
                    ..Default::default()
                },
            ),
        );
    }
    digests.sort();

    SystemContextFingerprint {
        system_prompt: prompt_fp,
        workspace_files: files,
        combined_hash: content_digest(&digests.join("\n")),
    }
}

/// Compare two fingerprints. Null-safe: either side absent means changed.
pub fn compare_fingerprints(
    a: Option<&ContextFingerprint>,
    b: Option<&ContextFingerprint>,
) -> FingerprintDelta {
    match (a, b) {
        (Some(a), Some(b)) => FingerprintDelta {
            changed: a.hash != b.hash,
            token_delta: b.token_estimate as i64 - a.token_estimate as i64,
            version_delta: b.version as i64 - a.version as i64,
        },
        (None, Some(b)) => FingerprintDelta {
            changed: true,
            token_delta: b.token_estimate as i64,
            version_delta: b.version as i64,
        },
        (Some(a), None) => FingerprintDelta {
            changed: true,
            token_delta: -(a.token_estimate as i64),
            version_delta: -(a.version as i64),
        },
        (None, None) => FingerprintDelta {
            changed: true,
            token_delta: 0,
            version_delta: 0,
        },
    }
}

/// Group messages by content hash and return only the groups with more
/// than one member. Surfaces exact-duplicate content (repeated tool-error
/// dumps and the like) for potential elision upstream.
pub fn find_duplicates(messages: &[FingerprintedMessage]) -> Vec<DuplicateGroup> {
    let mut by_hash: HashMap<&str, Vec<&str>> = HashMap::new();
    for msg in messages {
        by_hash
            .entry(msg.fingerprint.hash.as_str())
            .or_default()
            .push(msg.id.as_str());
    }

    let mut groups: Vec<DuplicateGroup> = by_hash
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(hash, ids)| DuplicateGroup {
            hash: hash.to_string(),
            message_ids: ids.into_iter().map(String::from).collect(),
        })
        .collect();
    // Deterministic output regardless of map iteration order.
    groups.sort_by(|a, b| a.hash.cmp(&b.hash));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_hash_is_truncated() {
        let fp = create_fingerprint("hello world", FingerprintOptions::default());
        assert_eq!(fp.hash.len(), SHORT_HASH_LEN);
        assert_eq!(fp.version, 1);
    }

    #[test]
    fn token_estimate_rounds_up() {
        let fp = create_fingerprint("hello", FingerprintOptions::default());
        assert_eq!(fp.token_estimate, 2); // 5 chars / 4, ceil
    }

    #[test]
    fn empty_content_is_zero_tokens() {
        let fp = create_fingerprint("", FingerprintOptions::default());
        assert_eq!(fp.token_estimate, 0);
    }

    #[test]
    fn version_increments_from_existing() {
        let fp = create_fingerprint(
            "v2 content",
            FingerprintOptions {
                existing_version: Some(4),
                ..Default::default()
            },
        );
        assert_eq!(fp.version, 5);
    }

    #[test]
    fn importance_is_clamped() {
        let fp = create_fingerprint(
            "x",
            FingerprintOptions {
                importance: Some(3.5),
                ..Default::default()
            },
        );
        assert_eq!(fp.importance, 1.0);
    }

    #[test]
    fn role_defaults() {
        assert_eq!(default_importance(Role::System), 0.9);
        assert_eq!(default_importance(Role::User), 0.7);
        assert_eq!(default_importance(Role::Assistant), 0.6);
        assert_eq!(default_importance(Role::Tool), 0.3);
    }

    #[test]
    fn message_importance_overridable() {
        let msg = Message::tool_result("output");
        let fp = fingerprint_message(&msg, Some(0.95));
        assert_eq!(fp.fingerprint.importance, 0.95);
    }

    #[test]
    fn combined_hash_independent_of_file_order() {
        let mut files_a = BTreeMap::new();
        files_a.insert("a.rs".to_string(), "fn a() {}".to_string());
        files_a.insert("b.rs".to_string(), "fn b() {}".to_string());

        // Same entries inserted in reverse order.
        let mut files_b = BTreeMap::new();
        files_b.insert("b.rs".to_string(), "fn b() {}".to_string());
        files_b.insert("a.rs".to_string(), "fn a() {}".to_string());

        let ctx_a = fingerprint_system_context("prompt", &files_a);
        let ctx_b = fingerprint_system_context("prompt", &files_b);
        assert_eq!(ctx_a.combined_hash, ctx_b.combined_hash);
    }

    #[test]
    fn combined_hash_is_full_width() {
        let ctx = fingerprint_system_context("prompt", &BTreeMap::new());
        assert_eq!(ctx.combined_hash.len(), 64);
    }

    #[test]
    fn combined_hash_changes_with_file_content() {
        let mut files = BTreeMap::new();
        files.insert("a.rs".to_string(), "fn a() {}".to_string());
        let before = fingerprint_system_context("prompt", &files);

        files.insert("a.rs".to_string(), "fn a() { todo!() }".to_string());
        let after = fingerprint_system_context("prompt", &files);
        assert_ne!(before.combined_hash, after.combined_hash);
    }

    #[test]
    fn compare_detects_change() {
        let a = create_fingerprint("one", FingerprintOptions::default());
        let b = create_fingerprint("two longer content", FingerprintOptions::default());
        let delta = compare_fingerprints(Some(&a), Some(&b));
        assert!(delta.changed);
        assert!(delta.token_delta > 0);
    }

    #[test]
    fn compare_identical_is_unchanged() {
        let a = create_fingerprint("same", FingerprintOptions::default());
        let b = create_fingerprint("same", FingerprintOptions::default());
        let delta = compare_fingerprints(Some(&a), Some(&b));
        assert!(!delta.changed);
        assert_eq!(delta.token_delta, 0);
    }

    #[test]
    fn compare_is_null_safe() {
        let a = create_fingerprint("present", FingerprintOptions::default());
        assert!(compare_fingerprints(None, Some(&a)).changed);
        assert!(compare_fingerprints(Some(&a), None).changed);
        assert!(compare_fingerprints(None, None).changed);
    }

    #[test]
    fn duplicates_grouped_by_hash() {
        let dump = "Error: connection refused";
        let msgs = vec![
            fingerprint_message(&Message::tool_result(dump), None),
            fingerprint_message(&Message::tool_result(dump), None),
            fingerprint_message(&Message::user("unique"), None),
        ];
        let groups = find_duplicates(&msgs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].message_ids.len(), 2);
    }

    #[test]
    fn no_duplicates_no_groups() {
        let msgs = vec![
            fingerprint_message(&Message::user("one"), None),
            fingerprint_message(&Message::user("two"), None),
        ];
        assert!(find_duplicates(&msgs).is_empty());
    }
}
