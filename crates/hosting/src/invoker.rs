//! Seam between hosted handlers and the model.

use async_trait::async_trait;

use attache_agent::AgentAdapter;

use crate::context::TurnContext;

/// How handlers reach the agent. The adapter's contract carries through:
/// implementations always come back with reply text, never an error.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(&self, prompt: &str, turn: &TurnContext) -> String;
}

#[async_trait]
impl AgentInvoker for AgentAdapter {
    async fn invoke(&self, prompt: &str, turn: &TurnContext) -> String {
        self.invoke_agent_scoped(prompt, turn.conversation_id(), turn.correlation_id())
            .await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::AgentInvoker;
    use crate::context::TurnContext;

    /// Queue-backed fake: hands out scripted replies in order and records
    /// every prompt it saw.
    pub(crate) struct ScriptedAgent {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedAgent {
        pub(crate) fn with_replies(replies: &[&str]) -> Self {
            Self {
                replies: Mutex::new(replies.iter().map(|reply| reply.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompts lock").clone()
        }

        pub(crate) fn invocation_count(&self) -> usize {
            self.prompts.lock().expect("prompts lock").len()
        }
    }

    #[async_trait]
    impl AgentInvoker for ScriptedAgent {
        async fn invoke(&self, prompt: &str, _turn: &TurnContext) -> String {
            self.prompts
                .lock()
                .expect("prompts lock")
                .push(prompt.to_string());
            self.replies
                .lock()
                .expect("replies lock")
                .pop_front()
                .unwrap_or_else(|| "scripted agent ran out of replies".to_string())
        }
    }
}
