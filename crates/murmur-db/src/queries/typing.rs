use anyhow::Result;

use crate::Database;
use crate::models::TypingRow;

impl Database {
    pub fn upsert_typing(&self, conversation_id: &str, user_id: &str, now: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO typing_indicators (conversation_id, user_id, is_typing, updated_at)
                 VALUES (?1, ?2, 1, ?3)
                 ON CONFLICT(conversation_id, user_id) DO UPDATE SET
                     is_typing = 1,
                     updated_at = excluded.updated_at",
                [conversation_id, user_id, now],
            )?;
            Ok(())
        })
    }

    /// Clears the flag on an existing row. A user with no row is left alone.
    pub fn stop_typing(&self, conversation_id: &str, user_id: &str, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE typing_indicators SET is_typing = 0, updated_at = ?3
                 WHERE conversation_id = ?1 AND user_id = ?2",
                [conversation_id, user_id, now],
            )?)
        })
    }

    /// Rows flagged as typing and refreshed at or after `since`, excluding one user.
    pub fn typing_since(&self, conversation_id: &str, exclude_user: &str, since: &str) -> Result<Vec<TypingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT conversation_id, user_id, is_typing, updated_at
                 FROM typing_indicators
                 WHERE conversation_id = ?1
                   AND user_id != ?2
                   AND is_typing = 1
                   AND updated_at >= ?3
                 ORDER BY updated_at",
            )?;
            let rows = stmt
                .query_map([conversation_id, exclude_user, since], |row| {
                    Ok(TypingRow {
                        conversation_id: row.get(0)?,
                        user_id: row.get(1)?,
                        is_typing: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::models::NewConversation;
    use crate::test_support::*;

    #[test]
    fn typing_rows_filter_by_flag_and_freshness() {
        let db = seeded();
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

        db.upsert_typing("g1", ALICE, "2026-01-01T00:00:01.000000Z").unwrap();
        db.upsert_typing("g1", BOB, "2026-01-01T00:00:05.000000Z").unwrap();
        db.upsert_typing("g1", CAROL, "2026-01-01T00:00:05.000000Z").unwrap();
        db.stop_typing("g1", CAROL, "2026-01-01T00:00:06.000000Z").unwrap();

        let fresh = db.typing_since("g1", ALICE, "2026-01-01T00:00:03.000000Z").unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].user_id, BOB);
        assert!(fresh[0].is_typing);

        // Bob's own view excludes Bob; Alice's row is stale by then.
        assert!(db.typing_since("g1", BOB, "2026-01-01T00:00:03.000000Z").unwrap().is_empty());
    }

    #[test]
    fn stop_without_row_is_a_no_op() {
        let db = seeded();
        assert_eq!(db.stop_typing("nowhere", ALICE, T0).unwrap(), 0);
    }
}
