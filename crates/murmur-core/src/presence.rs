use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use murmur_db::models::PresenceRow;
use murmur_types::api::UserPresence;

use crate::{ChatError, Result, Session, convert};

/// Largest batch a single presence lookup accepts.
pub const MAX_PRESENCE_BATCH: usize = 500;

/// Online status and last-seen time. Clients refresh their own status while
/// active; a user whose last online refresh is older than the presence
/// window reads as offline without anyone writing that down.
pub struct Presence<'a> {
    session: Session<'a>,
}

impl<'a> Presence<'a> {
    pub(crate) fn new(session: Session<'a>) -> Self {
        Self { session }
    }

    /// Sets the caller's own status and stamps `last_seen` with now.
    pub fn update(&self, is_online: bool) -> Result<UserPresence> {
        let s = &self.session;
        let me = s.caller_key();
        if s.db().set_presence(&me, is_online, &s.now_key())? == 0 {
            return Err(ChatError::NotFound("profile"));
        }
        debug!("User {} online={}", me, is_online);
        self.of(s.caller())
    }

    pub fn of(&self, user_id: Uuid) -> Result<UserPresence> {
        let rows = self.session.db().get_presence(&[user_id.to_string()])?;
        rows.first()
            .map(|row| self.judge(row))
            .ok_or(ChatError::NotFound("user"))
    }

    /// Presence for several users, in request order. Unknown users and
    /// repeated ids are left out.
    pub fn of_many(&self, user_ids: &[Uuid]) -> Result<Vec<UserPresence>> {
        if user_ids.len() > MAX_PRESENCE_BATCH {
            return Err(ChatError::Invalid(format!(
                "at most {} users per presence lookup",
                MAX_PRESENCE_BATCH
            )));
        }

        let mut seen = HashSet::new();
        let ids: Vec<String> = user_ids
            .iter()
            .filter(|id| seen.insert(**id))
            .map(Uuid::to_string)
            .collect();

        let rows = self.session.db().get_presence(&ids)?;
        let by_id: HashMap<&str, &PresenceRow> = rows.iter().map(|r| (r.id.as_str(), r)).collect();
        Ok(ids
            .iter()
            .filter_map(|id| by_id.get(id.as_str()))
            .map(|row| self.judge(row))
            .collect())
    }

    fn judge(&self, row: &PresenceRow) -> UserPresence {
        let s = &self.session;
        let last_seen: Option<DateTime<Utc>> =
            row.last_seen.as_deref().map(|raw| convert::time(raw, "profile last_seen"));
        let fresh_after = s.now() - s.config().presence_window;

        UserPresence {
            user_id: convert::uuid(&row.id, "profile id"),
            is_online: row.is_online && last_seen.is_some_and(|at| at > fresh_after),
            last_seen,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use uuid::Uuid;

    use crate::ChatError;
    use crate::test_support::*;

    #[test]
    fn unseen_users_are_offline() {
        let h = Harness::new();
        let bob = h.as_user(ALICE).presence().of(BOB).unwrap();
        assert!(!bob.is_online);
        assert_eq!(bob.last_seen, None);
    }

    #[test]
    fn online_lapses_after_the_window() {
        let h = Harness::new();
        let mine = h.as_user(BOB).presence().update(true).unwrap();
        assert!(mine.is_online);

        h.clock.advance(Duration::minutes(4));
        assert!(h.as_user(ALICE).presence().of(BOB).unwrap().is_online);

        h.clock.advance(Duration::minutes(2));
        let stale = h.as_user(ALICE).presence().of(BOB).unwrap();
        assert!(!stale.is_online);
        assert_eq!(stale.last_seen, mine.last_seen);
    }

    #[test]
    fn going_offline_keeps_last_seen() {
        let h = Harness::new();
        h.as_user(BOB).presence().update(true).unwrap();
        h.clock.advance(Duration::seconds(30));
        let offline = h.as_user(BOB).presence().update(false).unwrap();

        let seen = h.as_user(ALICE).presence().of(BOB).unwrap();
        assert!(!seen.is_online);
        assert_eq!(seen.last_seen, offline.last_seen);
    }

    #[test]
    fn batch_lookup_keeps_order_and_skips_unknown() {
        let h = Harness::new();
        h.as_user(CAROL).presence().update(true).unwrap();
        let stranger = Uuid::from_u128(0xdead);

        let batch = h.as_user(ALICE).presence().of_many(&[CAROL, stranger, BOB, CAROL]).unwrap();
        let ids: Vec<_> = batch.iter().map(|p| p.user_id).collect();
        assert_eq!(ids, [CAROL, BOB]);
        assert!(batch[0].is_online);
        assert!(!batch[1].is_online);

        let err = h.as_user(ALICE).presence().of(stranger).unwrap_err();
        assert!(matches!(err, ChatError::NotFound("user")));
    }

    #[test]
    fn oversized_batches_are_rejected() {
        let h = Harness::new();
        let ids: Vec<Uuid> = (0..=super::MAX_PRESENCE_BATCH as u128).map(Uuid::from_u128).collect();
        let err = h.as_user(ALICE).presence().of_many(&ids).unwrap_err();
        assert!(matches!(err, ChatError::Invalid(_)));
    }

    #[test]
    fn callers_without_a_profile_cannot_publish_presence() {
        let h = Harness::new();
        let err = h.as_user(Uuid::from_u128(0xbeef)).presence().update(true).unwrap_err();
        assert!(matches!(err, ChatError::NotFound("profile")));
    }
}
