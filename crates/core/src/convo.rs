//! Per-conversation state and the terms acceptance gate.
//!
//! The gate sits in front of message handling: until the conversation has
//! accepted the terms of use, nothing reaches the agent. Acceptance is a
//! hard-coded string comparison on the trimmed, case-insensitive message
//! text, not a parsed intent.

use serde::{Deserialize, Serialize};

/// The literal consent phrase, compared trimmed and case-insensitively.
pub const ACCEPTANCE_PHRASE: &str = "i accept";

pub const INSTALL_FIRST_REPLY: &str =
    "Please install the agent in this conversation before sending messages.";
pub const TERMS_REMINDER_REPLY: &str =
    "Before we can chat, please review the terms of use and reply \"I accept\" to continue.";
pub const TERMS_THANKS_REPLY: &str =
    "Thank you for accepting the terms of use. How can I help you today?";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermsState {
    #[default]
    NotAccepted,
    Accepted,
}

/// Mutable record kept per conversation for the life of the process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub installed: bool,
    pub terms: TermsState,
    pub message_count: u64,
}

impl ConversationState {
    /// Installation-update "add": the conversation starts gated.
    pub fn mark_installed(&mut self) {
        self.installed = true;
    }

    /// Installation-update "remove": both flags return to initial values.
    pub fn reset_installation(&mut self) {
        self.installed = false;
        self.terms = TermsState::NotAccepted;
    }

    pub fn accept_terms(&mut self) {
        self.terms = TermsState::Accepted;
    }
}

/// What the message handler must do before (or instead of) invoking the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Not installed: reply with the install prompt, agent never invoked.
    NotInstalled,
    /// Terms pending and this message is not the consent phrase.
    Reminder,
    /// This message is the consent phrase; the caller records acceptance
    /// and replies with the thank-you exactly once.
    JustAccepted,
    /// Gate open; normal message handling applies.
    Pass,
}

pub fn is_acceptance_phrase(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case(ACCEPTANCE_PHRASE)
}

/// Pure gate evaluation against the pre-update state.
pub fn evaluate_gate(state: &ConversationState, text: &str) -> GateDecision {
    if !state.installed {
        return GateDecision::NotInstalled;
    }
    match state.terms {
        TermsState::Accepted => GateDecision::Pass,
        TermsState::NotAccepted => {
            if is_acceptance_phrase(text) {
                GateDecision::JustAccepted
            } else {
                GateDecision::Reminder
            }
        }
    }
}

/// Evaluates the gate and applies its state effects in one step. Meant to
/// run inside a store's atomic update so the decision and the mutation
/// cannot be torn apart by a concurrent turn.
pub fn apply_gate(state: &mut ConversationState, text: &str) -> GateDecision {
    let decision = evaluate_gate(state, text);
    match decision {
        GateDecision::JustAccepted => state.accept_terms(),
        GateDecision::Pass => state.message_count += 1,
        GateDecision::NotInstalled | GateDecision::Reminder => {}
    }
    decision
}
