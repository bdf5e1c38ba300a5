use anyhow::Result;
use rusqlite::Row;
use rusqlite::types::ToSql;

use super::{OptionalExt, id_params, placeholders};
use crate::Database;
use crate::models::{NewParticipant, ParticipantRow};

const PARTICIPANT_COLUMNS: &str = "conversation_id, user_id, role, joined_at, left_at, muted_until";

impl Database {
    /// Inserts all rows in one statement, so either every participant is
    /// added or none is.
    pub fn insert_participants(
        &self,
        conversation_id: &str,
        participants: &[NewParticipant<'_>],
        joined_at: &str,
    ) -> Result<()> {
        if participants.is_empty() {
            return Ok(());
        }

        self.with_conn_mut(|conn| {
            let values: Vec<String> = (0..participants.len())
                .map(|i| format!("(?1, ?2, ?{}, ?{})", 3 + i * 2, 4 + i * 2))
                .collect();
            let sql = format!(
                "INSERT INTO conversation_participants (conversation_id, joined_at, user_id, role) VALUES {}",
                values.join(", ")
            );

            let mut params: Vec<&dyn ToSql> = vec![&conversation_id, &joined_at];
            for p in participants {
                params.push(&p.user_id);
                params.push(&p.role);
            }

            conn.execute(&sql, params.as_slice())?;
            Ok(())
        })
    }

    pub fn active_participant(&self, conversation_id: &str, user_id: &str) -> Result<Option<ParticipantRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM conversation_participants
                     WHERE conversation_id = ?1 AND user_id = ?2 AND left_at IS NULL",
                    PARTICIPANT_COLUMNS
                ),
                [conversation_id, user_id],
                map_participant,
            )
            .optional()
        })
    }

    /// Active participants of several conversations, oldest membership first.
    pub fn active_participants(&self, conversation_ids: &[String]) -> Result<Vec<ParticipantRow>> {
        if conversation_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM conversation_participants
                 WHERE conversation_id IN ({}) AND left_at IS NULL
                 ORDER BY joined_at, rowid",
                PARTICIPANT_COLUMNS,
                placeholders(1, conversation_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(id_params(conversation_ids).as_slice(), map_participant)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn leave_conversation(&self, conversation_id: &str, user_id: &str, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE conversation_participants SET left_at = ?3
                 WHERE conversation_id = ?1 AND user_id = ?2 AND left_at IS NULL",
                [conversation_id, user_id, now],
            )?)
        })
    }

    pub fn set_muted_until(&self, conversation_id: &str, user_id: &str, until: Option<&str>) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE conversation_participants SET muted_until = ?3
                 WHERE conversation_id = ?1 AND user_id = ?2 AND left_at IS NULL",
                rusqlite::params![conversation_id, user_id, until],
            )?)
        })
    }
}

fn map_participant(row: &Row<'_>) -> rusqlite::Result<ParticipantRow> {
    Ok(ParticipantRow {
        conversation_id: row.get(0)?,
        user_id: row.get(1)?,
        role: row.get(2)?,
        joined_at: row.get(3)?,
        left_at: row.get(4)?,
        muted_until: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::models::{NewConversation, NewParticipant};
    use crate::test_support::*;
    use crate::{Database, is_foreign_key_violation, is_unique_violation};

    fn group(db: &Database) {
        db.insert_conversation(&NewConversation {
            id: "g1",
            kind: "group",
            name: Some("Team"),
            avatar_ref: None,
            pair_key: None,
            created_by: ALICE,
            created_at: T0,
        })
        .unwrap();
        db.insert_participants(
            "g1",
            &[
                NewParticipant { user_id: ALICE, role: "admin" },
                NewParticipant { user_id: BOB, role: "member" },
            ],
            T0,
        )
        .unwrap();
    }

    #[test]
    fn second_active_row_is_rejected() {
        let db = seeded();
        group(&db);
        let err = db
            .insert_participants("g1", &[NewParticipant { user_id: BOB, role: "member" }], T0)
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn batch_insert_is_all_or_nothing() {
        let db = seeded();
        group(&db);
        let err = db
            .insert_participants(
                "g1",
                &[
                    NewParticipant { user_id: CAROL, role: "member" },
                    NewParticipant { user_id: "no-such-user", role: "member" },
                ],
                T0,
            )
            .unwrap_err();
        assert!(is_foreign_key_violation(&err));
        assert!(db.active_participant("g1", CAROL).unwrap().is_none());
    }

    #[test]
    fn rejoin_keeps_history() {
        let db = seeded();
        group(&db);
        assert_eq!(db.leave_conversation("g1", BOB, "2026-01-01T00:01:00.000000Z").unwrap(), 1);
        assert!(db.active_participant("g1", BOB).unwrap().is_none());

        db.insert_participants(
            "g1",
            &[NewParticipant { user_id: BOB, role: "member" }],
            "2026-01-01T00:02:00.000000Z",
        )
        .unwrap();

        let (rows, left): (i64, i64) = db
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*), COUNT(left_at) FROM conversation_participants
                     WHERE conversation_id = 'g1' AND user_id = ?1",
                    [BOB],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )?)
            })
            .unwrap();
        assert_eq!((rows, left), (2, 1));
        assert!(db.active_participant("g1", BOB).unwrap().is_some());
    }

    #[test]
    fn mute_only_touches_active_row() {
        let db = seeded();
        group(&db);
        let until = "2026-02-01T00:00:00.000000Z";
        assert_eq!(db.set_muted_until("g1", ALICE, Some(until)).unwrap(), 1);
        assert_eq!(db.set_muted_until("g1", CAROL, Some(until)).unwrap(), 0);

        let alice = db.active_participant("g1", ALICE).unwrap().unwrap();
        assert_eq!(alice.muted_until.as_deref(), Some(until));
        let bob = db.active_participant("g1", BOB).unwrap().unwrap();
        assert_eq!(bob.muted_until, None);
    }
}
