use tracing::{debug, warn};
use uuid::Uuid;

use murmur_db::is_unique_violation;
use murmur_types::api::{ReactionView, ToggleOutcome};

use crate::{ChatError, Result, Session, convert};

/// Longest accepted emoji, in bytes. Enough for multi-codepoint sequences.
const MAX_EMOJI_BYTES: usize = 32;

pub struct Reactions<'a> {
    session: Session<'a>,
}

impl<'a> Reactions<'a> {
    pub(crate) fn new(session: Session<'a>) -> Self {
        Self { session }
    }

    /// Adds the caller's `emoji` reaction, or removes it if already present.
    pub fn toggle(&self, message_id: Uuid, emoji: &str) -> Result<ToggleOutcome> {
        let s = &self.session;
        let emoji = emoji.trim();
        if emoji.is_empty() || emoji.len() > MAX_EMOJI_BYTES {
            return Err(ChatError::Invalid(format!("emoji must be 1 to {} bytes", MAX_EMOJI_BYTES)));
        }

        let row = s.message_row(message_id)?;
        s.require_member(&row.conversation_id)?;
        if row.deleted_at.is_some() {
            return Err(ChatError::NotFound("message"));
        }

        let id = Uuid::new_v4().to_string();
        let me = s.caller_key();
        match s.db().toggle_reaction(&id, &row.id, &me, emoji, &s.now_key()) {
            Ok((true, _)) => {
                debug!("User {} reacted {} to {}", me, emoji, row.id);
                Ok(ToggleOutcome::Added)
            }
            Ok((false, removed)) => {
                debug!("User {} removed reaction {} from {}", me, removed, row.id);
                Ok(ToggleOutcome::Removed)
            }
            // A concurrent toggle inserted the same reaction first.
            Err(e) if is_unique_violation(&e) => {
                warn!("Reaction {} on {} by {} already present", emoji, row.id, me);
                Ok(ToggleOutcome::Added)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All reactions on a message with the reacting user's profile.
    pub fn list(&self, message_id: Uuid) -> Result<Vec<ReactionView>> {
        let s = &self.session;
        let row = s.message_row(message_id)?;
        s.require_member(&row.conversation_id)?;
        if row.deleted_at.is_some() {
            return Err(ChatError::NotFound("message"));
        }

        let reactions = s.db().reactions_for_message(&row.id)?;
        let user_ids: Vec<String> = reactions.iter().map(|r| r.user_id.clone()).collect();
        let profiles = s.profiles(&user_ids)?;

        Ok(reactions
            .iter()
            .map(|r| ReactionView {
                reaction: convert::reaction(r),
                user: profiles.get(&r.user_id).cloned(),
            })
            .collect())
    }
}
