//! Long-lived fingerprint store for a single conversation.
//!
//! The [`FingerprintManager`] owns a [`FingerprintStore`] and exposes a
//! typed get/update surface whose update methods report whether the
//! underlying fingerprint changed — the signal that drives incremental
//! cache invalidation upstream. One manager per conversation; the store
//! is plain data and can be exported/imported as JSON for persistence
//! handoff to whatever backend the caller prefers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use promptloom_core::error::Result;
use promptloom_core::message::Message;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{
    ContextFingerprint, FingerprintOptions, create_fingerprint, default_importance,
};

/// Serializable snapshot of everything fingerprinted so far.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintStore {
    /// Message id → fingerprint.
    pub messages: HashMap<String, ContextFingerprint>,
    /// System prompt fingerprint, if one has been recorded.
    pub system_prompt: Option<ContextFingerprint>,
    /// Workspace file path → fingerprint.
    pub workspace_files: HashMap<String, ContextFingerprint>,
    /// When the store last changed.
    pub last_update: DateTime<Utc>,
}

impl Default for FingerprintStore {
    fn default() -> Self {
        Self {
            messages: HashMap::new(),
            system_prompt: None,
            workspace_files: HashMap::new(),
            last_update: Utc::now(),
        }
    }
}

/// Mutable fingerprint bookkeeping for one conversation.
///
/// Not thread-shared: create one instance per conversation.
#[derive(Debug, Default)]
pub struct FingerprintManager {
    store: FingerprintStore,
}

impl FingerprintManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-fingerprint a message, returning whether its content changed.
    ///
    /// Unchanged content leaves the stored fingerprint (and its version)
    /// untouched; changed content stores a new fingerprint with a bumped
    /// version.
    pub fn update_message(&mut self, message: &Message, importance: Option<f64>) -> bool {
        let importance = importance.unwrap_or_else(|| default_importance(message.role));
        let existing = self.store.messages.get(&message.id);
        let next = create_fingerprint(
            &message.content,
            FingerprintOptions {
                importance: Some(importance),
                existing_version: existing.map(|fp| fp.version),
                ..Default::default()
            },
        );

        if existing.is_some_and(|fp| fp.hash == next.hash) {
            return false;
        }
        debug!(message_id = %message.id, version = next.version, "message fingerprint changed");
        self.store.messages.insert(message.id.clone(), next);
        self.store.last_update = Utc::now();
        true
    }

    /// Re-fingerprint the system prompt (importance 1.0), returning
    /// whether it changed.
    pub fn update_system_prompt(&mut self, system_prompt: &str) -> bool {
        let next = create_fingerprint(
            system_prompt,
            FingerprintOptions {
                importance: Some(1.0),
                existing_version: self.store.system_prompt.as_ref().map(|fp| fp.version),
                ..Default::default()
            },
        );

        if self
            .store
            .system_prompt
            .as_ref()
            .is_some_and(|fp| fp.hash == next.hash)
        {
            return false;
        }
        debug!(version = next.version, "system prompt fingerprint changed");
        self.store.system_prompt = Some(next);
        self.store.last_update = Utc::now();
        true
    }

    /// Re-fingerprint a workspace file (importance 0.8), returning
    /// whether it changed.
    pub fn update_workspace_file(&mut self, path: &str, content: &str) -> bool {
        let existing = self.store.workspace_files.get(path);
        let next = create_fingerprint(
            content,
            FingerprintOptions {
                importance: Some(0.8),
                existing_version: existing.map(|fp| fp.version),
                ..Default::default()
            },
        );

        if existing.is_some_and(|fp| fp.hash == next.hash) {
            return false;
        }
        debug!(path, version = next.version, "workspace file fingerprint changed");
        self.store.workspace_files.insert(path.to_string(), next);
        self.store.last_update = Utc::now();
        true
    }

    /// Fingerprint for a message id, if recorded.
    pub fn message(&self, id: &str) -> Option<&ContextFingerprint> {
        self.store.messages.get(id)
    }

    /// Fingerprint of the system prompt, if recorded.
    pub fn system_prompt(&self) -> Option<&ContextFingerprint> {
        self.store.system_prompt.as_ref()
    }

    /// Fingerprint for a workspace file, if recorded.
    pub fn workspace_file(&self, path: &str) -> Option<&ContextFingerprint> {
        self.store.workspace_files.get(path)
    }

    /// Sum of token estimates across everything in the store.
    pub fn total_token_estimate(&self) -> usize {
        self.store
            .messages
            .values()
            .map(|fp| fp.token_estimate)
            .sum::<usize>()
            + self
                .store
                .system_prompt
                .as_ref()
                .map_or(0, |fp| fp.token_estimate)
            + self
                .store
                .workspace_files
                .values()
                .map(|fp| fp.token_estimate)
                .sum::<usize>()
    }

    /// Message ids with their fingerprints, highest importance first.
    /// Ties broken by id for determinism.
    pub fn messages_by_importance(&self) -> Vec<(&str, &ContextFingerprint)> {
        let mut entries: Vec<(&str, &ContextFingerprint)> = self
            .store
            .messages
            .iter()
            .map(|(id, fp)| (id.as_str(), fp))
            .collect();
        entries.sort_by(|a, b| {
            b.1.importance
                .partial_cmp(&a.1.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        entries
    }

    /// Serialize the store for persistence handoff.
    pub fn export(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.store)?)
    }

    /// Rebuild a manager from a previously exported store.
    pub fn import(json: &str) -> Result<Self> {
        let store: FingerprintStore = serde_json::from_str(json)?;
        Ok(Self { store })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_reports_change() {
        let mut mgr = FingerprintManager::new();
        let msg = Message::user("hello");
        assert!(mgr.update_message(&msg, None));
        assert_eq!(mgr.message(&msg.id).unwrap().version, 1);
    }

    #[test]
    fn unchanged_content_reports_no_change() {
        let mut mgr = FingerprintManager::new();
        let msg = Message::user("stable content");
        assert!(mgr.update_message(&msg, None));
        assert!(!mgr.update_message(&msg, None));
        // Version must not have been bumped.
        assert_eq!(mgr.message(&msg.id).unwrap().version, 1);
    }

    #[test]
    fn edited_content_bumps_version() {
        let mut mgr = FingerprintManager::new();
        let mut msg = Message::user("draft one");
        mgr.update_message(&msg, None);
        msg.content = "draft two".to_string();
        assert!(mgr.update_message(&msg, None));
        assert_eq!(mgr.message(&msg.id).unwrap().version, 2);
    }

    #[test]
    fn system_prompt_change_detected() {
        let mut mgr = FingerprintManager::new();
        assert!(mgr.update_system_prompt("You are helpful"));
        assert!(!mgr.update_system_prompt("You are helpful"));
        assert!(mgr.update_system_prompt("You are terse"));
        assert_eq!(mgr.system_prompt().unwrap().version, 2);
    }

    #[test]
    fn workspace_file_importance() {
        let mut mgr = FingerprintManager::new();
        mgr.update_workspace_file("src/main.rs", "fn main() {}");
        assert_eq!(mgr.workspace_file("src/main.rs").unwrap().importance, 0.8);
    }

    #[test]
    fn total_token_estimate_sums_everything() {
        let mut mgr = FingerprintManager::new();
        mgr.update_system_prompt("12345678"); // 2 tokens
        mgr.update_workspace_file("a.txt", "1234"); // 1 token
        mgr.update_message(&Message::user("123456789012"), None); // 3 tokens
        assert_eq!(mgr.total_token_estimate(), 6);
    }

    #[test]
    fn messages_sorted_by_importance_desc() {
        let mut mgr = FingerprintManager::new();
        let tool = Message::tool_result("tool output");
        let user = Message::user("user question");
        mgr.update_message(&tool, None); // 0.3
        mgr.update_message(&user, None); // 0.7
        let sorted = mgr.messages_by_importance();
        assert_eq!(sorted[0].0, user.id);
        assert_eq!(sorted[1].0, tool.id);
    }

    #[test]
    fn export_import_roundtrip() {
        let mut mgr = FingerprintManager::new();
        let msg = Message::user("persist me");
        mgr.update_message(&msg, None);
        mgr.update_system_prompt("prompt");

        let json = mgr.export().unwrap();
        let restored = FingerprintManager::import(&json).unwrap();
        assert_eq!(
            restored.message(&msg.id).unwrap().hash,
            mgr.message(&msg.id).unwrap().hash
        );
        assert!(restored.system_prompt().is_some());
    }

    #[test]
    fn import_rejects_garbage() {
        assert!(FingerprintManager::import("not json").is_err());
    }
}
