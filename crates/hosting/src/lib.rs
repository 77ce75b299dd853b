//! Activity Hosting - routing and conversation flow for the agent host
//!
//! This crate turns one inbound activity into zero or more reply activities:
//! - **Router** (`router`) - registration table keyed on activity kind;
//!   every handler registered for a kind runs, in registration order
//! - **Messages** (`messages`) - the terms gate in front of agent chat
//! - **Notifications** (`notifications`) - email/document-comment dispatch
//!   with a catch-all acknowledgment for unknown kinds
//! - **Lifecycle** (`lifecycle`) - install/uninstall and membership updates
//! - **State** (`state`) - the injected per-conversation store
//!
//! # Architecture
//!
//! ```text
//! POST /api/messages → ActivityRouter → handlers → TurnContext replies
//!                              ↓
//!                    Terms-Gate / AgentInvoker
//! ```
//!
//! # Key Types
//!
//! - `ActivityRouter` - per-request dispatch, fan-out per kind
//! - `TurnContext` - conversation id, correlation id, reply sink
//! - `ConversationStore` - trait over per-conversation state
//! - `AgentInvoker` - seam to the agent adapter (always returns text)

pub mod context;
pub mod invoker;
pub mod lifecycle;
pub mod messages;
pub mod notifications;
pub mod router;
pub mod state;

pub use context::TurnContext;
pub use invoker::AgentInvoker;
pub use lifecycle::{ConversationUpdateHandler, InstallationHandler};
pub use messages::MessageHandler;
pub use notifications::{
    NotificationDispatcher, MALFORMED_COMMENT_REPLY, MALFORMED_EMAIL_REPLY,
    UNKNOWN_NOTIFICATION_REPLY,
};
pub use router::{
    default_router, ActivityHandler, ActivityRouter, DispatchError, DispatchOutcome,
    HandlerError, HandlerResult,
};
pub use state::{ConversationStore, MemoryConversationStore};
