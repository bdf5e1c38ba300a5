use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use crate::{Result, Session, convert};

/// Read receipts and the unread counts derived from them.
pub struct Receipts<'a> {
    session: Session<'a>,
}

impl<'a> Receipts<'a> {
    pub(crate) fn new(session: Session<'a>) -> Self {
        Self { session }
    }

    /// Records receipts for every live incoming message the caller has not
    /// read yet. Returns how many receipts were written.
    pub fn mark_read(&self, conversation_id: Uuid) -> Result<usize> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let me = s.caller_key();
        let written = s.db().mark_conversation_read(&conv_id, &me, &s.now_key())?;
        debug!("User {} marked {} messages read in {}", me, written, conv_id);
        Ok(written)
    }

    /// Live messages from others the caller has no receipt for.
    pub fn unread_count(&self, conversation_id: Uuid) -> Result<u64> {
        let s = &self.session;
        let conv_id = conversation_id.to_string();
        s.require_member(&conv_id)?;

        let tallies = s.db().unread_tallies(&s.caller_key(), &[conv_id])?;
        Ok(tallies.first().map(|t| t.unread()).unwrap_or(0))
    }

    /// Unread counts for several conversations at once. Conversations the
    /// caller is not an active member of are left out.
    pub fn unread_counts(&self, conversation_ids: &[Uuid]) -> Result<HashMap<Uuid, u64>> {
        let s = &self.session;
        let me = s.caller_key();

        let requested: HashSet<String> = conversation_ids.iter().map(Uuid::to_string).collect();
        let ids: Vec<String> = s
            .db()
            .memberships(&me)?
            .into_iter()
            .map(|m| m.conversation.id)
            .filter(|id| requested.contains(id))
            .collect();

        let mut counts: HashMap<Uuid, u64> = ids
            .iter()
            .map(|id| (convert::uuid(id, "conversation id"), 0))
            .collect();
        for tally in s.db().unread_tallies(&me, &ids)? {
            counts.insert(convert::uuid(&tally.conversation_id, "conversation id"), tally.unread());
        }
        Ok(counts)
    }

    /// Who has read a message. Works on deleted messages too.
    pub fn read_by(&self, message_id: Uuid) -> Result<Vec<Uuid>> {
        let s = &self.session;
        let row = s.message_row(message_id)?;
        s.require_member(&row.conversation_id)?;

        Ok(s.db()
            .readers_of(&row.id)?
            .iter()
            .map(|id| convert::uuid(id, "reader id"))
            .collect())
    }
}
