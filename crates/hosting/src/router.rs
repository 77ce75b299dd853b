//! Activity routing: a registration table consulted once per inbound request.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use attache_core::activity::{Activity, ActivityKind};

use crate::context::TurnContext;
use crate::invoker::AgentInvoker;
use crate::lifecycle::{ConversationUpdateHandler, InstallationHandler};
use crate::messages::MessageHandler;
use crate::notifications::NotificationDispatcher;
use crate::state::ConversationStore;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    /// The handler produced reply text; the router queues it on the turn.
    Responded(String),
    /// Handled with no reply.
    Processed,
    /// The activity body did not match the handler's kind.
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{kind} handler failure: {message}")]
pub struct HandlerError {
    pub kind: &'static str,
    pub message: String,
}

impl HandlerError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// What dispatch did with the activity. `Unhandled` is not an error: the
/// HTTP layer still answers 200 and the activity is logged and dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    Handled { handlers: usize, responses: usize },
    Unhandled,
}

#[async_trait]
pub trait ActivityHandler: Send + Sync {
    fn kind(&self) -> ActivityKind;
    async fn handle(
        &self,
        activity: &Activity,
        turn: &TurnContext,
    ) -> Result<HandlerResult, HandlerError>;
}

#[derive(Default)]
pub struct ActivityRouter {
    handlers: HashMap<ActivityKind, Vec<Arc<dyn ActivityHandler>>>,
}

impl ActivityRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers stack: everything registered for a kind runs, in
    /// registration order.
    pub fn on_activity<H>(&mut self, handler: H)
    where
        H: ActivityHandler + 'static,
    {
        self.handlers
            .entry(handler.kind())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Invokes every handler registered for the activity's kind and queues
    /// their replies on the turn. The first handler error aborts the turn
    /// and propagates to the HTTP layer.
    pub async fn dispatch(
        &self,
        activity: &Activity,
        turn: &TurnContext,
    ) -> Result<DispatchOutcome, DispatchError> {
        let kind = activity.kind();
        let Some(handlers) = self.handlers.get(&kind) else {
            tracing::warn!(
                kind = kind.as_str(),
                conversation_id = turn.conversation_id(),
                "no handler registered, activity dropped"
            );
            return Ok(DispatchOutcome::Unhandled);
        };

        let mut responses = 0;
        for handler in handlers {
            match handler.handle(activity, turn).await? {
                HandlerResult::Responded(text) => {
                    turn.send_text(text);
                    responses += 1;
                }
                HandlerResult::Processed | HandlerResult::Ignored => {}
            }
        }
        Ok(DispatchOutcome::Handled { handlers: handlers.len(), responses })
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

/// The standard host wiring: gated messages, notification dispatch and the
/// two lifecycle handlers, all sharing one store and one agent.
pub fn default_router(
    store: Arc<dyn ConversationStore>,
    agent: Arc<dyn AgentInvoker>,
) -> ActivityRouter {
    let mut router = ActivityRouter::new();
    router.on_activity(MessageHandler::new(store.clone(), agent.clone()));
    router.on_activity(NotificationDispatcher::new(agent));
    router.on_activity(InstallationHandler::new(store));
    router.on_activity(ConversationUpdateHandler);
    router
}
