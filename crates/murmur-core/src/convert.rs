//! Row-to-model conversion. Corrupt column values are logged and replaced
//! with a default instead of failing the whole read.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use murmur_db::models::{ConversationRow, MessageRow, ParticipantRow, ProfileRow, ReactionRow};
use murmur_db::parse_timestamp;
use murmur_types::models::{
    Conversation, ConversationKind, Message, MessageType, Participant, ParticipantRole, ProfileSummary,
    Reaction,
};

pub(crate) fn uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn time(raw: &str, what: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|e| {
        warn!("Corrupt {}: {}", what, e);
        DateTime::default()
    })
}

fn opt_time(raw: Option<&str>, what: &str) -> Option<DateTime<Utc>> {
    raw.map(|r| time(r, what))
}

fn opt_uuid(raw: Option<&str>, what: &str) -> Option<Uuid> {
    raw.map(|r| uuid(r, what))
}

pub(crate) fn profile(row: &ProfileRow) -> ProfileSummary {
    ProfileSummary {
        id: uuid(&row.id, "profile id"),
        display_name: row.display_name.clone(),
        handle: row.handle.clone(),
        avatar_ref: row.avatar_ref.clone(),
    }
}

pub(crate) fn conversation(row: &ConversationRow) -> Conversation {
    Conversation {
        id: uuid(&row.id, "conversation id"),
        kind: row.kind.parse().unwrap_or_else(|e| {
            warn!("{} on conversation '{}'", e, row.id);
            ConversationKind::Group
        }),
        name: row.name.clone(),
        avatar_ref: row.avatar_ref.clone(),
        created_by: uuid(&row.created_by, "conversation creator"),
        created_at: time(&row.created_at, "conversation created_at"),
        updated_at: time(&row.updated_at, "conversation updated_at"),
        last_message_at: opt_time(row.last_message_at.as_deref(), "conversation last_message_at"),
    }
}

pub(crate) fn participant(row: &ParticipantRow, profile: Option<ProfileSummary>) -> Participant {
    Participant {
        conversation_id: uuid(&row.conversation_id, "participant conversation_id"),
        user_id: uuid(&row.user_id, "participant user_id"),
        role: parse_role(&row.role),
        joined_at: time(&row.joined_at, "participant joined_at"),
        left_at: opt_time(row.left_at.as_deref(), "participant left_at"),
        muted_until: opt_time(row.muted_until.as_deref(), "participant muted_until"),
        profile,
    }
}

/// Unknown roles fall back to the least privileged one.
pub(crate) fn parse_role(raw: &str) -> ParticipantRole {
    raw.parse().unwrap_or_else(|e| {
        warn!("{}", e);
        ParticipantRole::Member
    })
}

pub(crate) fn message(row: &MessageRow) -> Message {
    Message {
        id: uuid(&row.id, "message id"),
        conversation_id: uuid(&row.conversation_id, "message conversation_id"),
        sender_id: uuid(&row.sender_id, "message sender_id"),
        content: row.content.clone(),
        message_type: row.message_type.parse().unwrap_or_else(|e| {
            warn!("{} on message '{}'", e, row.id);
            MessageType::Text
        }),
        media_ref: row.media_ref.clone(),
        media_thumbnail_ref: row.media_thumbnail_ref.clone(),
        file_name: row.file_name.clone(),
        file_size: row.file_size.and_then(|v| u64::try_from(v).ok()),
        duration_seconds: row.duration_seconds.and_then(|v| u32::try_from(v).ok()),
        reply_to_id: opt_uuid(row.reply_to_id.as_deref(), "reply_to_id"),
        forwarded_from_id: opt_uuid(row.forwarded_from_id.as_deref(), "forwarded_from_id"),
        is_pinned: row.is_pinned,
        created_at: time(&row.created_at, "message created_at"),
        updated_at: time(&row.updated_at, "message updated_at"),
        deleted_at: opt_time(row.deleted_at.as_deref(), "message deleted_at"),
    }
}

pub(crate) fn reaction(row: &ReactionRow) -> Reaction {
    Reaction {
        id: uuid(&row.id, "reaction id"),
        message_id: uuid(&row.message_id, "reaction message_id"),
        user_id: uuid(&row.user_id, "reaction user_id"),
        emoji: row.emoji.clone(),
        created_at: time(&row.created_at, "reaction created_at"),
    }
}
