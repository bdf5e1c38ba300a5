use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Conversation, Message, Participant, ProfileSummary, Reaction};

// -- JWT Claims --

/// Claims carried by the bearer token. Tokens are issued by the identity
/// service; this side only validates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Profiles --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertProfileRequest {
    pub display_name: Option<String>,
    pub handle: Option<String>,
    pub avatar_ref: Option<String>,
}

// -- Presence --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePresenceRequest {
    pub is_online: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresenceLookupRequest {
    pub user_ids: Vec<Uuid>,
}

/// Online state of one user. `is_online` is already judged against the
/// freshness window, so a client that stopped refreshing reads as offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPresence {
    pub user_id: Uuid,
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDirectRequest {
    pub peer_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_ref: Option<String>,
    pub member_ids: Vec<Uuid>,
}

/// Partial update: absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateConversationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddParticipantRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MuteRequest {
    pub until: Option<DateTime<Utc>>,
}

/// One row of the caller's conversation list.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Option<Message>,
    pub unread_count: u64,
    pub other_participant: Option<ProfileSummary>,
    pub muted_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participants: Vec<Participant>,
    pub last_message: Option<Message>,
    pub unread_count: u64,
    pub other_participant: Option<ProfileSummary>,
}

// -- Messages --

/// Paging cursor for message listings. Pass the `id` of the oldest message
/// of the previous page as `before_id` to page backwards without skipping
/// messages that share its timestamp. `before` filters by time alone.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub before: Option<DateTime<Utc>>,
    #[serde(default)]
    pub before_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardMessageRequest {
    pub target_conversation_id: Uuid,
}

/// Result of resolving a reference to another message. A reference to a
/// deleted or missing message resolves to `Unavailable`, never to an error.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum Resolved<T> {
    Available(T),
    Unavailable,
}

impl<T> Resolved<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn available(self) -> Option<T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub sender: Option<ProfileSummary>,
    pub reply_to: Option<Resolved<Box<Message>>>,
    pub forwarded_from: Option<Resolved<Box<Message>>>,
    /// Whether the caller has seen this message. Own messages count as read.
    pub is_read: bool,
    pub read_by: Vec<Uuid>,
    pub reactions: Vec<ReactionGroup>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: usize,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub unread_count: u64,
}

#[derive(Debug, Serialize)]
pub struct ReadByResponse {
    pub user_ids: Vec<Uuid>,
}

// -- Typing --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetTypingRequest {
    pub is_typing: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TypingUser {
    pub user_id: Uuid,
    pub profile: Option<ProfileSummary>,
    pub updated_at: DateTime<Utc>,
}

// -- Reactions --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleReactionRequest {
    pub emoji: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleOutcome {
    Added,
    Removed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionView {
    #[serde(flatten)]
    pub reaction: Reaction,
    pub user: Option<ProfileSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionGroup {
    pub emoji: String,
    pub count: usize,
    pub user_ids: Vec<Uuid>,
}
