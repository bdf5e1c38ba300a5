use anyhow::Result;
use rusqlite::Row;

use super::OptionalExt;
use crate::Database;
use crate::models::{ConversationRow, MembershipRow, NewConversation, ParticipantRow};

const CONVERSATION_COLUMNS: &str =
    "c.id, c.kind, c.name, c.avatar_ref, c.created_by, c.created_at, c.updated_at, c.last_message_at";

impl Database {
    pub fn insert_conversation(&self, new: &NewConversation<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO conversations
                     (id, kind, name, avatar_ref, pair_key, created_by, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                rusqlite::params![
                    new.id,
                    new.kind,
                    new.name,
                    new.avatar_ref,
                    new.pair_key,
                    new.created_by,
                    new.created_at
                ],
            )?;
            Ok(())
        })
    }

    /// Hard delete. Participants, messages, receipts, reactions and typing
    /// rows go with it through ON DELETE CASCADE.
    pub fn delete_conversation(&self, id: &str) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM conversations WHERE id = ?1", [id])?))
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<ConversationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM conversations c WHERE c.id = ?1", CONVERSATION_COLUMNS),
                [id],
                |row| map_conversation(row, 0),
            )
            .optional()
        })
    }

    /// Partial metadata update: `None` leaves the column as it is.
    pub fn update_conversation_metadata(
        &self,
        id: &str,
        name: Option<&str>,
        avatar_ref: Option<&str>,
        now: &str,
    ) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE conversations
                 SET name = COALESCE(?2, name),
                     avatar_ref = COALESCE(?3, avatar_ref),
                     updated_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id, name, avatar_ref, now],
            )?)
        })
    }

    /// Advances `last_message_at` (never moves it backwards) and `updated_at`.
    pub fn touch_last_message(&self, id: &str, at: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE conversations
                 SET last_message_at = ?2, updated_at = ?2
                 WHERE id = ?1 AND (last_message_at IS NULL OR last_message_at < ?2)",
                [id, at],
            )?)
        })
    }

    /// The oldest direct conversation in which both users are still active.
    pub fn find_direct_between(&self, user_id: &str, peer_id: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT c.id
                 FROM conversations c
                 JOIN conversation_participants me
                     ON me.conversation_id = c.id AND me.user_id = ?1 AND me.left_at IS NULL
                 JOIN conversation_participants peer
                     ON peer.conversation_id = c.id AND peer.user_id = ?2 AND peer.left_at IS NULL
                 WHERE c.kind = 'direct'
                 ORDER BY c.created_at, c.rowid
                 LIMIT 1",
                [user_id, peer_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    /// Detaches a pair key from whatever conversation still holds it, so a
    /// new direct conversation for the pair can claim it.
    pub fn release_pair_key(&self, pair_key: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE conversations SET pair_key = NULL WHERE pair_key = ?1",
                [pair_key],
            )?)
        })
    }

    /// Every conversation the user is an active participant of.
    pub fn memberships(&self, user_id: &str) -> Result<Vec<MembershipRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT p.conversation_id, p.user_id, p.role, p.joined_at, p.left_at, p.muted_until, {}
                 FROM conversation_participants p
                 JOIN conversations c ON c.id = p.conversation_id
                 WHERE p.user_id = ?1 AND p.left_at IS NULL
                 ORDER BY p.joined_at DESC",
                CONVERSATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(MembershipRow {
                        participant: ParticipantRow {
                            conversation_id: row.get(0)?,
                            user_id: row.get(1)?,
                            role: row.get(2)?,
                            joined_at: row.get(3)?,
                            left_at: row.get(4)?,
                            muted_until: row.get(5)?,
                        },
                        conversation: map_conversation(row, 6)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_conversation(row: &Row<'_>, offset: usize) -> rusqlite::Result<ConversationRow> {
    Ok(ConversationRow {
        id: row.get(offset)?,
        kind: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        avatar_ref: row.get(offset + 3)?,
        created_by: row.get(offset + 4)?,
        created_at: row.get(offset + 5)?,
        updated_at: row.get(offset + 6)?,
        last_message_at: row.get(offset + 7)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::is_unique_violation;
    use crate::models::{NewConversation, NewParticipant};
    use crate::test_support::*;

    fn direct(id: &'static str, pair_key: &'static str) -> NewConversation<'static> {
        NewConversation {
            id,
            kind: "direct",
            name: None,
            avatar_ref: None,
            pair_key: Some(pair_key),
            created_by: ALICE,
            created_at: T0,
        }
    }

    #[test]
    fn pair_key_is_unique() {
        let db = seeded();
        db.insert_conversation(&direct("c1", "a:b")).unwrap();

        let err = db.insert_conversation(&direct("c2", "a:b")).unwrap_err();
        assert!(is_unique_violation(&err));

        assert_eq!(db.release_pair_key("a:b").unwrap(), 1);
        db.insert_conversation(&direct("c2", "a:b")).unwrap();
    }

    #[test]
    fn finds_direct_only_while_both_active() {
        let db = seeded();
        db.insert_conversation(&direct("c1", "a:b")).unwrap();
        let members = [
            NewParticipant { user_id: ALICE, role: "member" },
            NewParticipant { user_id: BOB, role: "member" },
        ];
        db.insert_participants("c1", &members, T0).unwrap();

        assert_eq!(db.find_direct_between(ALICE, BOB).unwrap().as_deref(), Some("c1"));
        assert_eq!(db.find_direct_between(BOB, ALICE).unwrap().as_deref(), Some("c1"));
        assert_eq!(db.find_direct_between(ALICE, CAROL).unwrap(), None);

        db.leave_conversation("c1", BOB, "2026-01-01T00:01:00.000000Z").unwrap();
        assert_eq!(db.find_direct_between(ALICE, BOB).unwrap(), None);
    }

    #[test]
    fn metadata_update_is_partial() {
        let db = seeded();
        let mut group = direct("g1", "unused");
        group.kind = "group";
        group.pair_key = None;
        group.name = Some("Team");
        db.insert_conversation(&group).unwrap();

        db.update_conversation_metadata("g1", None, Some("avatars/g.png"), T0).unwrap();
        let row = db.get_conversation("g1").unwrap().unwrap();
        assert_eq!(row.name.as_deref(), Some("Team"));
        assert_eq!(row.avatar_ref.as_deref(), Some("avatars/g.png"));
    }

    #[test]
    fn last_message_never_moves_backwards() {
        let db = seeded();
        db.insert_conversation(&direct("c1", "a:b")).unwrap();
        db.touch_last_message("c1", "2026-01-01T00:05:00.000000Z").unwrap();
        db.touch_last_message("c1", "2026-01-01T00:01:00.000000Z").unwrap();

        let row = db.get_conversation("c1").unwrap().unwrap();
        assert_eq!(row.last_message_at.as_deref(), Some("2026-01-01T00:05:00.000000Z"));
    }

    #[test]
    fn delete_cascades_to_participants() {
        let db = seeded();
        db.insert_conversation(&direct("c1", "a:b")).unwrap();
        db.insert_participants("c1", &[NewParticipant { user_id: ALICE, role: "member" }], T0)
            .unwrap();

        assert_eq!(db.delete_conversation("c1").unwrap(), 1);
        assert!(db.memberships(ALICE).unwrap().is_empty());
    }
}
