//! Conversation state storage.
//!
//! The store is built once at startup and injected into the router; nothing
//! in this crate reaches for ambient state. Gate evaluation and its state
//! effects run inside a single lock acquisition, so two concurrent turns for
//! the same conversation cannot tear one update apart.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use attache_core::convo::{apply_gate, ConversationState, GateDecision};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Snapshot of the current state; unseen conversations read as default.
    async fn state(&self, conversation_id: &str) -> ConversationState;

    /// Runs the terms gate and applies its state effects atomically.
    async fn apply_message_gate(&self, conversation_id: &str, text: &str) -> GateDecision;

    async fn mark_installed(&self, conversation_id: &str);

    async fn reset_installation(&self, conversation_id: &str);
}

/// In-memory store with process lifetime.
#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: Mutex<HashMap<String, ConversationState>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn state(&self, conversation_id: &str) -> ConversationState {
        self.conversations
            .lock()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn apply_message_gate(&self, conversation_id: &str, text: &str) -> GateDecision {
        let mut conversations = self.conversations.lock().await;
        let state = conversations.entry(conversation_id.to_string()).or_default();
        apply_gate(state, text)
    }

    async fn mark_installed(&self, conversation_id: &str) {
        let mut conversations = self.conversations.lock().await;
        conversations
            .entry(conversation_id.to_string())
            .or_default()
            .mark_installed();
    }

    async fn reset_installation(&self, conversation_id: &str) {
        let mut conversations = self.conversations.lock().await;
        if let Some(state) = conversations.get_mut(conversation_id) {
            state.reset_installation();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attache_core::convo::TermsState;

    #[tokio::test]
    async fn gate_lifecycle_round_trips_through_the_store() {
        let store = MemoryConversationStore::new();

        assert_eq!(
            store.apply_message_gate("convo-1", "hello").await,
            GateDecision::NotInstalled
        );

        store.mark_installed("convo-1").await;
        assert_eq!(
            store.apply_message_gate("convo-1", "hello").await,
            GateDecision::Reminder
        );
        assert_eq!(
            store.apply_message_gate("convo-1", "I Accept").await,
            GateDecision::JustAccepted
        );
        assert_eq!(
            store.apply_message_gate("convo-1", "what now?").await,
            GateDecision::Pass
        );

        let state = store.state("convo-1").await;
        assert!(state.installed);
        assert_eq!(state.terms, TermsState::Accepted);
        assert_eq!(state.message_count, 1);
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let store = MemoryConversationStore::new();
        store.mark_installed("convo-a").await;

        assert_eq!(
            store.apply_message_gate("convo-a", "hi").await,
            GateDecision::Reminder
        );
        assert_eq!(
            store.apply_message_gate("convo-b", "hi").await,
            GateDecision::NotInstalled
        );
    }

    #[tokio::test]
    async fn reset_clears_installation_and_acceptance() {
        let store = MemoryConversationStore::new();
        store.mark_installed("convo-1").await;
        store.apply_message_gate("convo-1", "i accept").await;

        store.reset_installation("convo-1").await;
        let state = store.state("convo-1").await;
        assert!(!state.installed);
        assert_eq!(state.terms, TermsState::NotAccepted);
        assert_eq!(
            store.apply_message_gate("convo-1", "hello").await,
            GateDecision::NotInstalled
        );
    }

    #[tokio::test]
    async fn reset_of_unknown_conversation_is_a_no_op() {
        let store = MemoryConversationStore::new();
        store.reset_installation("never-seen").await;
        assert_eq!(store.state("never-seen").await, ConversationState::default());
    }
}
