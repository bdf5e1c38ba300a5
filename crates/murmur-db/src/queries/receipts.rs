use anyhow::Result;
use rusqlite::types::ToSql;

use super::{id_params, placeholders};
use crate::Database;
use crate::models::{ReadRow, UnreadTally};

impl Database {
    /// Writes a receipt for every live message in the conversation that
    /// someone else sent and `user_id` has not read yet. Returns how many
    /// receipts were new. The set difference happens inside SQLite, so the
    /// statement binds three parameters however large the backlog is.
    pub fn mark_conversation_read(&self, conversation_id: &str, user_id: &str, read_at: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let written = conn.execute(
                "INSERT OR IGNORE INTO message_reads (message_id, user_id, read_at)
                 SELECT m.id, ?2, ?3
                 FROM messages m
                 LEFT JOIN message_reads r ON r.message_id = m.id AND r.user_id = ?2
                 WHERE m.conversation_id = ?1
                   AND m.sender_id != ?2
                   AND m.deleted_at IS NULL
                   AND r.message_id IS NULL
                 ORDER BY m.created_at, m.rowid",
                [conversation_id, user_id, read_at],
            )?;
            Ok(written)
        })
    }

    pub fn readers_of(&self, message_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM message_reads WHERE message_id = ?1 ORDER BY read_at, rowid",
            )?;
            let ids = stmt
                .query_map([message_id], |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    /// Every receipt on any of the given messages.
    pub fn reads_for_messages(&self, message_ids: &[String]) -> Result<Vec<ReadRow>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT message_id, user_id FROM message_reads
                 WHERE message_id IN ({})
                 ORDER BY read_at, rowid",
                placeholders(1, message_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(id_params(message_ids).as_slice(), |row| {
                    Ok(ReadRow {
                        message_id: row.get(0)?,
                        user_id: row.get(1)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Incoming and read counts per conversation, computed in one query.
    /// Conversations without incoming messages are absent from the result.
    pub fn unread_tallies(&self, user_id: &str, conversation_ids: &[String]) -> Result<Vec<UnreadTally>> {
        if conversation_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT m.conversation_id, COUNT(*), COUNT(r.message_id)
                 FROM messages m
                 LEFT JOIN message_reads r ON r.message_id = m.id AND r.user_id = ?1
                 WHERE m.conversation_id IN ({})
                   AND m.sender_id != ?1
                   AND m.deleted_at IS NULL
                 GROUP BY m.conversation_id",
                placeholders(2, conversation_ids.len())
            );
            let mut params: Vec<&dyn ToSql> = vec![&user_id];
            params.extend(id_params(conversation_ids));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(UnreadTally {
                        conversation_id: row.get(0)?,
                        incoming: row.get::<_, i64>(1)? as u64,
                        read: row.get::<_, i64>(2)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
