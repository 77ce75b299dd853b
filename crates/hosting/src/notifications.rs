//! Notification dispatch: email, document comments and the catch-all.
//!
//! Dispatch is total. Every notification resolves to reply text, including
//! kinds this host has never seen and payloads whose sub-record is missing;
//! neither case reaches the agent.

use std::sync::Arc;

use async_trait::async_trait;

use attache_core::activity::{
    Activity, ActivityBody, ActivityKind, EmailNotification, NotificationClass,
    NotificationPayload, WordCommentNotification,
};

use crate::context::TurnContext;
use crate::invoker::AgentInvoker;
use crate::router::{ActivityHandler, HandlerError, HandlerResult};

pub const UNKNOWN_NOTIFICATION_REPLY: &str = "This notification type is not yet implemented.";
pub const MALFORMED_EMAIL_REPLY: &str = "I could not find the email notification details.";
pub const MALFORMED_COMMENT_REPLY: &str = "I could not find the document comment details.";

pub struct NotificationDispatcher {
    agent: Arc<dyn AgentInvoker>,
}

impl NotificationDispatcher {
    pub fn new(agent: Arc<dyn AgentInvoker>) -> Self {
        Self { agent }
    }

    async fn dispatch(&self, payload: &NotificationPayload, turn: &TurnContext) -> String {
        match payload.classify() {
            NotificationClass::Email(Some(email)) => self.handle_email(email, turn).await,
            NotificationClass::Email(None) => {
                tracing::warn!(
                    conversation_id = turn.conversation_id(),
                    "email notification without email details"
                );
                MALFORMED_EMAIL_REPLY.to_string()
            }
            NotificationClass::WordComment(Some(comment)) => {
                self.handle_word_comment(comment, turn).await
            }
            NotificationClass::WordComment(None) => {
                tracing::warn!(
                    conversation_id = turn.conversation_id(),
                    "comment notification without comment details"
                );
                MALFORMED_COMMENT_REPLY.to_string()
            }
            NotificationClass::Unknown(tag) => {
                tracing::info!(
                    conversation_id = turn.conversation_id(),
                    notification_type = tag,
                    "unrecognized notification type"
                );
                UNKNOWN_NOTIFICATION_REPLY.to_string()
            }
        }
    }

    /// Two calls on purpose: the model's tool access performs the actual
    /// retrieval during the first, so the second can act on real content.
    async fn handle_email(&self, email: &EmailNotification, turn: &TurnContext) -> String {
        let content = self.agent.invoke(&email_fetch_prompt(email), turn).await;
        self.agent.invoke(&email_action_prompt(&content), turn).await
    }

    async fn handle_word_comment(
        &self,
        comment: &WordCommentNotification,
        turn: &TurnContext,
    ) -> String {
        let comment_text = self.agent.invoke(&comment_fetch_prompt(comment), turn).await;
        self.agent
            .invoke(&comment_action_prompt(&comment.document_id, &comment_text), turn)
            .await
    }
}

fn email_fetch_prompt(email: &EmailNotification) -> String {
    format!(
        "A new email has arrived. Fetch the email with message ID {} from conversation {} \
         (conversation index {}, change key {}) and summarize its content.",
        email.message_id, email.conversation_id, email.conversation_index, email.change_key
    )
}

fn email_action_prompt(content: &str) -> String {
    format!(
        "You have received the following email. Please follow any instructions in it.\n\n{content}"
    )
}

fn comment_fetch_prompt(comment: &WordCommentNotification) -> String {
    format!(
        "You were mentioned in a comment on document {}. Fetch the text of comment(s) {} \
         so you can respond to them.",
        comment.document_id,
        comment.comment_ids.join(", ")
    )
}

fn comment_action_prompt(document_id: &str, comment_text: &str) -> String {
    format!(
        "You have been mentioned in a Word document comment.\nDocument ID: {document_id}\n\
         Comment: {comment_text}\n\nPlease respond to this comment appropriately."
    )
}

#[async_trait]
impl ActivityHandler for NotificationDispatcher {
    fn kind(&self) -> ActivityKind {
        ActivityKind::Notification
    }

    async fn handle(
        &self,
        activity: &Activity,
        turn: &TurnContext,
    ) -> Result<HandlerResult, HandlerError> {
        let ActivityBody::Notification(payload) = &activity.body else {
            return Ok(HandlerResult::Ignored);
        };
        let reply = self.dispatch(payload, turn).await;
        Ok(HandlerResult::Responded(reply))
    }
}
