//! Inbound activity model for the hosting channel.
//!
//! Every HTTP request delivers exactly one [`Activity`]: a conversation
//! reference plus a typed body. The body discriminant is closed; anything
//! the channel may send is representable, including notification payloads
//! whose tag we do not recognize.

use serde::{Deserialize, Serialize};

/// Wire tag for email notifications.
pub const NOTIFICATION_TAG_EMAIL: &str = "email";
/// Wire tag for Word document comment notifications.
pub const NOTIFICATION_TAG_WORD_COMMENT: &str = "wordComment";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationAccount {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One inbound event, immutable for the duration of the turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,
    #[serde(flatten)]
    pub body: ActivityBody,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActivityBody {
    Message {
        #[serde(default)]
        text: String,
    },
    Notification(NotificationPayload),
    InstallationUpdate {
        action: InstallationAction,
    },
    ConversationUpdate {
        #[serde(default, rename = "membersAdded")]
        members_added: Vec<ChannelAccount>,
    },
}

/// Router key: the activity type discriminant without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Message,
    Notification,
    InstallationUpdate,
    ConversationUpdate,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Notification => "notification",
            Self::InstallationUpdate => "installationUpdate",
            Self::ConversationUpdate => "conversationUpdate",
        }
    }
}

impl Activity {
    pub fn kind(&self) -> ActivityKind {
        match &self.body {
            ActivityBody::Message { .. } => ActivityKind::Message,
            ActivityBody::Notification(_) => ActivityKind::Notification,
            ActivityBody::InstallationUpdate { .. } => ActivityKind::InstallationUpdate,
            ActivityBody::ConversationUpdate { .. } => ActivityKind::ConversationUpdate,
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation.id
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallationAction {
    Add,
    Remove,
}

/// Notification body as it arrives on the wire. The tag and the sub-records
/// are independent fields, so a payload can declare a kind whose sub-record
/// is missing; [`NotificationPayload::classify`] surfaces that case instead
/// of hiding it behind a deserialization failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub notification_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailNotification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_comment: Option<WordCommentNotification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Identifiers the mail service needs to locate one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailNotification {
    pub message_id: String,
    pub conversation_id: String,
    pub conversation_index: String,
    pub change_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCommentNotification {
    pub document_id: String,
    #[serde(default)]
    pub comment_ids: Vec<String>,
}

/// Closed classification of a notification for exhaustive dispatch.
///
/// `Email(None)` / `WordComment(None)` mean the tag was declared but the
/// matching sub-record is absent (a malformed payload). `Unknown` retains
/// the raw tag for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationClass<'a> {
    Email(Option<&'a EmailNotification>),
    WordComment(Option<&'a WordCommentNotification>),
    Unknown(&'a str),
}

impl NotificationPayload {
    pub fn classify(&self) -> NotificationClass<'_> {
        match self.notification_type.as_str() {
            NOTIFICATION_TAG_EMAIL => NotificationClass::Email(self.email.as_ref()),
            NOTIFICATION_TAG_WORD_COMMENT => {
                NotificationClass::WordComment(self.word_comment.as_ref())
            }
            other => NotificationClass::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Activity, ActivityBody, ActivityKind, InstallationAction, NotificationClass,
        NotificationPayload,
    };

    #[test]
    fn message_envelope_decodes_with_camel_case_tag() {
        let raw = r#"{
            "type": "message",
            "id": "a-1",
            "conversation": {"id": "convo-7"},
            "from": {"id": "user-3", "name": "Dana"},
            "text": "hello there"
        }"#;

        let activity: Activity = serde_json::from_str(raw).expect("decode message");
        assert_eq!(activity.kind(), ActivityKind::Message);
        assert_eq!(activity.conversation_id(), "convo-7");
        match activity.body {
            ActivityBody::Message { text } => assert_eq!(text, "hello there"),
            other => panic!("expected message body, got {other:?}"),
        }
    }

    #[test]
    fn installation_update_decodes_add_and_remove() {
        let raw = r#"{
            "type": "installationUpdate",
            "conversation": {"id": "convo-7"},
            "action": "remove"
        }"#;

        let activity: Activity = serde_json::from_str(raw).expect("decode installation update");
        assert_eq!(activity.kind(), ActivityKind::InstallationUpdate);
        assert!(matches!(
            activity.body,
            ActivityBody::InstallationUpdate { action: InstallationAction::Remove }
        ));
    }

    #[test]
    fn email_notification_classifies_with_sub_record() {
        let raw = r#"{
            "type": "notification",
            "conversation": {"id": "convo-9"},
            "notificationType": "email",
            "email": {
                "messageId": "m-1",
                "conversationId": "mail-thread-4",
                "conversationIndex": "AQHa",
                "changeKey": "CQAAABYAAA"
            }
        }"#;

        let activity: Activity = serde_json::from_str(raw).expect("decode email notification");
        let ActivityBody::Notification(payload) = &activity.body else {
            panic!("expected notification body");
        };
        match payload.classify() {
            NotificationClass::Email(Some(email)) => {
                assert_eq!(email.message_id, "m-1");
                assert_eq!(email.change_key, "CQAAABYAAA");
            }
            other => panic!("expected well-formed email classification, got {other:?}"),
        }
    }

    #[test]
    fn declared_tag_without_sub_record_classifies_as_malformed() {
        let payload = NotificationPayload {
            notification_type: "email".to_string(),
            ..NotificationPayload::default()
        };
        assert!(matches!(payload.classify(), NotificationClass::Email(None)));

        let payload = NotificationPayload {
            notification_type: "wordComment".to_string(),
            ..NotificationPayload::default()
        };
        assert!(matches!(payload.classify(), NotificationClass::WordComment(None)));
    }

    #[test]
    fn unrecognized_tag_retains_raw_value() {
        let payload = NotificationPayload {
            notification_type: "calendarInvite".to_string(),
            ..NotificationPayload::default()
        };
        assert!(matches!(
            payload.classify(),
            NotificationClass::Unknown("calendarInvite")
        ));
    }

    #[test]
    fn conversation_update_captures_added_members() {
        let raw = r#"{
            "type": "conversationUpdate",
            "conversation": {"id": "convo-2"},
            "membersAdded": [{"id": "user-1"}, {"id": "agent-1", "name": "attache"}]
        }"#;

        let activity: Activity = serde_json::from_str(raw).expect("decode conversation update");
        match activity.body {
            ActivityBody::ConversationUpdate { members_added } => {
                assert_eq!(members_added.len(), 2);
                assert_eq!(members_added[1].name.as_deref(), Some("attache"));
            }
            other => panic!("expected conversation update, got {other:?}"),
        }
    }
}
