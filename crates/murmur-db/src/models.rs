//! Database row types. These map directly to SQLite rows.
//! Distinct from murmur-types models to keep the DB layer independent.

pub struct ProfileRow {
    pub id: String,
    pub display_name: Option<String>,
    pub handle: Option<String>,
    pub avatar_ref: Option<String>,
}

pub struct PresenceRow {
    pub id: String,
    pub is_online: bool,
    pub last_seen: Option<String>,
}

pub struct ConversationRow {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub avatar_ref: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
    pub last_message_at: Option<String>,
}

pub struct NewConversation<'a> {
    pub id: &'a str,
    pub kind: &'a str,
    pub name: Option<&'a str>,
    pub avatar_ref: Option<&'a str>,
    pub pair_key: Option<&'a str>,
    pub created_by: &'a str,
    pub created_at: &'a str,
}

pub struct ParticipantRow {
    pub conversation_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: String,
    pub left_at: Option<String>,
    pub muted_until: Option<String>,
}

pub struct NewParticipant<'a> {
    pub user_id: &'a str,
    pub role: &'a str,
}

/// A caller's active membership joined with its conversation.
pub struct MembershipRow {
    pub participant: ParticipantRow,
    pub conversation: ConversationRow,
}

#[derive(Clone)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub content: Option<String>,
    pub message_type: String,
    pub media_ref: Option<String>,
    pub media_thumbnail_ref: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub reply_to_id: Option<String>,
    pub forwarded_from_id: Option<String>,
    pub is_pinned: bool,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

pub struct NewMessage<'a> {
    pub id: &'a str,
    pub conversation_id: &'a str,
    pub sender_id: &'a str,
    pub content: Option<&'a str>,
    pub message_type: &'a str,
    pub media_ref: Option<&'a str>,
    pub media_thumbnail_ref: Option<&'a str>,
    pub file_name: Option<&'a str>,
    pub file_size: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub reply_to_id: Option<&'a str>,
    pub forwarded_from_id: Option<&'a str>,
    pub created_at: &'a str,
}

pub struct ReadRow {
    pub message_id: String,
    pub user_id: String,
}

/// Incoming (not self-sent, not deleted) messages in a conversation, and how
/// many of them the user has a receipt for.
pub struct UnreadTally {
    pub conversation_id: String,
    pub incoming: u64,
    pub read: u64,
}

impl UnreadTally {
    pub fn unread(&self) -> u64 {
        self.incoming.saturating_sub(self.read)
    }
}

pub struct TypingRow {
    pub conversation_id: String,
    pub user_id: String,
    pub is_typing: bool,
    pub updated_at: String,
}

pub struct ReactionRow {
    pub id: String,
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: String,
}
