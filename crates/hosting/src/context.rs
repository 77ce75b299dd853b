//! Per-turn context threaded through every handler.

use std::sync::Mutex;

use uuid::Uuid;

use attache_core::activity::{Activity, ActivityBody, ConversationAccount};

/// One inbound request's worth of context: the conversation it belongs to,
/// a correlation id for the log stream, and the sink collecting outbound
/// activities for the HTTP response.
pub struct TurnContext {
    conversation_id: String,
    correlation_id: String,
    replies: Mutex<Vec<Activity>>,
}

impl TurnContext {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            correlation_id: Uuid::new_v4().to_string(),
            replies: Mutex::new(Vec::new()),
        }
    }

    pub fn for_activity(activity: &Activity) -> Self {
        Self::new(activity.conversation_id())
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Queues a message reply addressed to this turn's conversation.
    pub fn send_text(&self, text: impl Into<String>) {
        let reply = Activity {
            id: Some(Uuid::new_v4().to_string()),
            conversation: ConversationAccount { id: self.conversation_id.clone() },
            from: None,
            body: ActivityBody::Message { text: text.into() },
        };
        let mut replies = self.replies.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        replies.push(reply);
    }

    pub fn reply_count(&self) -> usize {
        self.replies
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Drains the collected replies for the HTTP response body.
    pub fn into_replies(self) -> Vec<Activity> {
        self.replies
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_carry_the_turn_conversation() {
        let turn = TurnContext::new("convo-12");
        turn.send_text("first");
        turn.send_text("second");

        assert_eq!(turn.reply_count(), 2);
        let replies = turn.into_replies();
        assert_eq!(replies.len(), 2);
        assert!(replies.iter().all(|reply| reply.conversation_id() == "convo-12"));
        match &replies[0].body {
            ActivityBody::Message { text } => assert_eq!(text, "first"),
            other => panic!("expected message reply, got {other:?}"),
        }
    }

    #[test]
    fn each_turn_gets_a_fresh_correlation_id() {
        let first = TurnContext::new("convo-1");
        let second = TurnContext::new("convo-1");
        assert_ne!(first.correlation_id(), second.correlation_id());
        assert!(!first.correlation_id().is_empty());
    }

    #[test]
    fn replies_are_serializable_activities() {
        let turn = TurnContext::new("convo-3");
        turn.send_text("hello");
        let replies = turn.into_replies();
        let encoded = serde_json::to_value(&replies[0]).expect("serialize reply");
        assert_eq!(encoded["type"], "message");
        assert_eq!(encoded["text"], "hello");
        assert_eq!(encoded["conversation"]["id"], "convo-3");
    }
}
