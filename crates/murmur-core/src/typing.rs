use tracing::debug;
use uuid::Uuid;

use murmur_db::timestamp;
use murmur_types::api::TypingUser;

use crate::{Result, Session, convert};

/// Typing presence. A signal counts only while it is fresher than the
/// configured window; stale rows are ignored at read time, never swept.
pub struct Typing<'a> {
    session: Session<'a>,
}

impl<'a> Typing<'a> {
    pub(crate) fn new(session: Session<'a>) -> Self {
        Self { session }
    }

    pub fn set_typing(&self, conversation_id: Uuid, is_typing: bool) -> Result<()> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let me = s.caller_key();
        if is_typing {
            s.db().upsert_typing(&conv_id, &me, &s.now_key())?;
        } else {
            s.db().stop_typing(&conv_id, &me, &s.now_key())?;
        }
        debug!("User {} typing={} in {}", me, is_typing, conv_id);
        Ok(())
    }

    /// Other users whose typing signal is still fresh.
    pub fn currently_typing(&self, conversation_id: Uuid) -> Result<Vec<TypingUser>> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let since = timestamp(s.now() - s.config().typing_window);
        let rows = s.db().typing_since(&conv_id, &s.caller_key(), &since)?;

        let user_ids: Vec<String> = rows.iter().map(|r| r.user_id.clone()).collect();
        let profiles = s.profiles(&user_ids)?;

        Ok(rows
            .iter()
            .map(|row| TypingUser {
                user_id: convert::uuid(&row.user_id, "typing user_id"),
                profile: profiles.get(&row.user_id).cloned(),
                updated_at: convert::time(&row.updated_at, "typing updated_at"),
            })
            .collect())
    }
}
