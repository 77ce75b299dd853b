//! Installation and membership lifecycle events.

use std::sync::Arc;

use async_trait::async_trait;

use attache_core::activity::{Activity, ActivityBody, ActivityKind, InstallationAction};

use crate::context::TurnContext;
use crate::router::{ActivityHandler, HandlerError, HandlerResult};
use crate::state::ConversationStore;

/// Install marks the conversation; uninstall resets both the installed flag
/// and the terms acceptance, so a reinstall starts gated again.
pub struct InstallationHandler {
    store: Arc<dyn ConversationStore>,
}

impl InstallationHandler {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ActivityHandler for InstallationHandler {
    fn kind(&self) -> ActivityKind {
        ActivityKind::InstallationUpdate
    }

    async fn handle(
        &self,
        activity: &Activity,
        turn: &TurnContext,
    ) -> Result<HandlerResult, HandlerError> {
        let ActivityBody::InstallationUpdate { action } = &activity.body else {
            return Ok(HandlerResult::Ignored);
        };
        match action {
            InstallationAction::Add => {
                self.store.mark_installed(turn.conversation_id()).await;
                tracing::info!(conversation_id = turn.conversation_id(), "agent installed");
            }
            InstallationAction::Remove => {
                self.store.reset_installation(turn.conversation_id()).await;
                tracing::info!(
                    conversation_id = turn.conversation_id(),
                    "agent removed, conversation state reset"
                );
            }
        }
        Ok(HandlerResult::Processed)
    }
}

/// Membership churn carries no host behavior; it is acknowledged and logged
/// so the router never reports these activities as unhandled.
pub struct ConversationUpdateHandler;

#[async_trait]
impl ActivityHandler for ConversationUpdateHandler {
    fn kind(&self) -> ActivityKind {
        ActivityKind::ConversationUpdate
    }

    async fn handle(
        &self,
        activity: &Activity,
        turn: &TurnContext,
    ) -> Result<HandlerResult, HandlerError> {
        let ActivityBody::ConversationUpdate { members_added } = &activity.body else {
            return Ok(HandlerResult::Ignored);
        };
        if !members_added.is_empty() {
            tracing::info!(
                conversation_id = turn.conversation_id(),
                members_added = members_added.len(),
                "conversation members added"
            );
        }
        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MemoryConversationStore;
    use attache_core::activity::{ChannelAccount, ConversationAccount};
    use attache_core::convo::TermsState;

    fn installation(conversation_id: &str, action: InstallationAction) -> Activity {
        Activity {
            id: None,
            conversation: ConversationAccount { id: conversation_id.to_string() },
            from: None,
            body: ActivityBody::InstallationUpdate { action },
        }
    }

    #[tokio::test]
    async fn add_marks_the_conversation_installed() {
        let store = Arc::new(MemoryConversationStore::new());
        let handler = InstallationHandler::new(store.clone());

        let activity = installation("convo-5", InstallationAction::Add);
        let turn = TurnContext::for_activity(&activity);
        let result = handler.handle(&activity, &turn).await.expect("handle");

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(turn.reply_count(), 0);
        let state = store.state("convo-5").await;
        assert!(state.installed);
        assert_eq!(state.terms, TermsState::NotAccepted);
    }

    #[tokio::test]
    async fn remove_resets_installation_and_terms() {
        let store = Arc::new(MemoryConversationStore::new());
        store.mark_installed("convo-5").await;
        store.apply_message_gate("convo-5", "i accept").await;

        let handler = InstallationHandler::new(store.clone());
        let activity = installation("convo-5", InstallationAction::Remove);
        let turn = TurnContext::for_activity(&activity);
        handler.handle(&activity, &turn).await.expect("handle");

        let state = store.state("convo-5").await;
        assert!(!state.installed);
        assert_eq!(state.terms, TermsState::NotAccepted);
    }

    #[tokio::test]
    async fn membership_updates_are_acknowledged_silently() {
        let handler = ConversationUpdateHandler;
        let activity = Activity {
            id: None,
            conversation: ConversationAccount { id: "convo-6".to_string() },
            from: None,
            body: ActivityBody::ConversationUpdate {
                members_added: vec![ChannelAccount { id: "user-9".to_string(), name: None }],
            },
        };
        let turn = TurnContext::for_activity(&activity);
        let result = handler.handle(&activity, &turn).await.expect("handle");

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(turn.reply_count(), 0);
    }
}
