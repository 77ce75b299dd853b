//! Gated message handling.
//!
//! Every message passes the terms gate before anything else. The agent is
//! invoked only once a conversation is installed and has accepted the terms;
//! the three gate replies are fixed strings, no model involved.

use std::sync::Arc;

use async_trait::async_trait;

use attache_core::activity::{Activity, ActivityBody, ActivityKind};
use attache_core::convo::{
    GateDecision, INSTALL_FIRST_REPLY, TERMS_REMINDER_REPLY, TERMS_THANKS_REPLY,
};

use crate::context::TurnContext;
use crate::invoker::AgentInvoker;
use crate::router::{ActivityHandler, HandlerError, HandlerResult};
use crate::state::ConversationStore;

pub struct MessageHandler {
    store: Arc<dyn ConversationStore>,
    agent: Arc<dyn AgentInvoker>,
}

impl MessageHandler {
    pub fn new(store: Arc<dyn ConversationStore>, agent: Arc<dyn AgentInvoker>) -> Self {
        Self { store, agent }
    }
}

#[async_trait]
impl ActivityHandler for MessageHandler {
    fn kind(&self) -> ActivityKind {
        ActivityKind::Message
    }

    async fn handle(
        &self,
        activity: &Activity,
        turn: &TurnContext,
    ) -> Result<HandlerResult, HandlerError> {
        let ActivityBody::Message { text } = &activity.body else {
            return Ok(HandlerResult::Ignored);
        };

        let decision = self.store.apply_message_gate(turn.conversation_id(), text).await;
        let reply = match decision {
            GateDecision::NotInstalled => {
                tracing::info!(
                    conversation_id = turn.conversation_id(),
                    "message arrived before installation"
                );
                INSTALL_FIRST_REPLY.to_string()
            }
            GateDecision::Reminder => TERMS_REMINDER_REPLY.to_string(),
            GateDecision::JustAccepted => {
                tracing::info!(conversation_id = turn.conversation_id(), "terms accepted");
                TERMS_THANKS_REPLY.to_string()
            }
            GateDecision::Pass => self.agent.invoke(text, turn).await,
        };
        Ok(HandlerResult::Responded(reply))
    }
}
