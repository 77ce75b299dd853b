pub mod activity;
pub mod config;
pub mod convo;
pub mod points;

pub use activity::{
    Activity, ActivityBody, ActivityKind, ChannelAccount, ConversationAccount, EmailNotification,
    InstallationAction, NotificationClass, NotificationPayload, WordCommentNotification,
};
pub use config::{
    AgentConfig, AgentProvider, AppConfig, ConfigError, ConfigOverrides, DatabaseConfig,
    LoadOptions, LogFormat, LoggingConfig, ServerConfig,
};
pub use convo::{
    apply_gate, evaluate_gate, is_acceptance_phrase, ConversationState, GateDecision, TermsState,
    ACCEPTANCE_PHRASE, INSTALL_FIRST_REPLY, TERMS_REMINDER_REPLY, TERMS_THANKS_REPLY,
};
pub use points::{
    next_streak, AwardBreakdown, BadgeCriteria, BadgeTier, ContributorSnapshot, PointsCalculator,
    Priority,
};
