use anyhow::Result;
use rusqlite::Row;

use super::{OptionalExt, id_params, placeholders};
use crate::Database;
use crate::models::ReactionRow;

impl Database {
    /// Toggle a reaction. Returns (added, reaction_id): the new row's id when
    /// added, the removed row's id when removed.
    pub fn toggle_reaction(
        &self,
        id: &str,
        message_id: &str,
        user_id: &str,
        emoji: &str,
        now: &str,
    ) -> Result<(bool, String)> {
        self.with_conn_mut(|conn| {
            // Check if reaction already exists
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM message_reactions WHERE message_id = ?1 AND user_id = ?2 AND emoji = ?3",
                    rusqlite::params![message_id, user_id, emoji],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(existing_id) = existing {
                conn.execute("DELETE FROM message_reactions WHERE id = ?1", [&existing_id])?;
                Ok((false, existing_id))
            } else {
                conn.execute(
                    "INSERT INTO message_reactions (id, message_id, user_id, emoji, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![id, message_id, user_id, emoji, now],
                )?;
                Ok((true, id.to_string()))
            }
        })
    }

    pub fn reactions_for_message(&self, message_id: &str) -> Result<Vec<ReactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, message_id, user_id, emoji, created_at FROM message_reactions
                 WHERE message_id = ?1
                 ORDER BY created_at, rowid",
            )?;
            let rows = stmt
                .query_map([message_id], map_reaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Batch-fetch reactions for a set of message IDs.
    pub fn reactions_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReactionRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, message_id, user_id, emoji, created_at FROM message_reactions
                 WHERE message_id IN ({})
                 ORDER BY created_at, rowid",
                placeholders(1, message_ids.len())
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(id_params(message_ids).as_slice(), map_reaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn map_reaction(row: &Row<'_>) -> rusqlite::Result<ReactionRow> {
    Ok(ReactionRow {
        id: row.get(0)?,
        message_id: row.get(1)?,
        user_id: row.get(2)?,
        emoji: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::models::{NewConversation, NewMessage, NewParticipant};
    use crate::test_support::*;
    use crate::{Database, is_unique_violation};

    fn message(db: &Database) {
        db.insert_conversation(&NewConversation {
            id: "c1",
            kind: "direct",
            name: None,
            avatar_ref: None,
            pair_key: Some("a:b"),
            created_by: ALICE,
            created_at: T0,
        })
        .unwrap();
        db.insert_participants(
            "c1",
            &[
                NewParticipant { user_id: ALICE, role: "member" },
                NewParticipant { user_id: BOB, role: "member" },
            ],
            T0,
        )
        .unwrap();
        db.insert_message(&NewMessage {
            id: "m1",
            conversation_id: "c1",
            sender_id: ALICE,
            content: Some("hello"),
            message_type: "text",
            media_ref: None,
            media_thumbnail_ref: None,
            file_name: None,
            file_size: None,
            duration_seconds: None,
            reply_to_id: None,
            forwarded_from_id: None,
            created_at: T0,
        })
        .unwrap();
    }

    #[test]
    fn toggle_adds_then_removes() {
        let db = seeded();
        message(&db);

        assert_eq!(db.toggle_reaction("r1", "m1", BOB, "👍", T0).unwrap(), (true, "r1".to_string()));
        assert_eq!(db.toggle_reaction("r2", "m1", BOB, "❤️", T0).unwrap(), (true, "r2".to_string()));
        assert_eq!(db.reactions_for_message("m1").unwrap().len(), 2);

        assert_eq!(db.toggle_reaction("r3", "m1", BOB, "👍", T0).unwrap(), (false, "r1".to_string()));
        let left = db.reactions_for_messages(&["m1".to_string()]).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].emoji, "❤️");
    }

    #[test]
    fn duplicate_triple_is_rejected_by_store() {
        let db = seeded();
        message(&db);
        db.toggle_reaction("r1", "m1", BOB, "👍", T0).unwrap();

        let err = db
            .with_conn_mut(|conn| {
                conn.execute(
                    "INSERT INTO message_reactions (id, message_id, user_id, emoji, created_at)
                     VALUES ('r9', 'm1', ?1, '👍', ?2)",
                    [BOB, T0],
                )?;
                Ok(())
            })
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }
}
