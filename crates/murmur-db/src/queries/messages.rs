use anyhow::Result;
use rusqlite::Row;

use super::{OptionalExt, id_params, placeholders};
use crate::{Database, fold_case};
use crate::models::{MessageRow, NewMessage};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, message_type, media_ref, \
     media_thumbnail_ref, file_name, file_size, duration_seconds, reply_to_id, forwarded_from_id, \
     is_pinned, created_at, updated_at, deleted_at";

impl Database {
    pub fn insert_message(&self, new: &NewMessage<'_>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (
                     id, conversation_id, sender_id, content, message_type, media_ref,
                     media_thumbnail_ref, file_name, file_size, duration_seconds, reply_to_id,
                     forwarded_from_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)",
                rusqlite::params![
                    new.id,
                    new.conversation_id,
                    new.sender_id,
                    new.content,
                    new.message_type,
                    new.media_ref,
                    new.media_thumbnail_ref,
                    new.file_name,
                    new.file_size,
                    new.duration_seconds,
                    new.reply_to_id,
                    new.forwarded_from_id,
                    new.created_at
                ],
            )?;
            Ok(())
        })
    }

    /// Looks a message up by id, soft-deleted or not.
    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS),
                [id],
                map_message,
            )
            .optional()
        })
    }

    /// Batch lookup by id, soft-deleted rows included.
    pub fn get_messages_by_ids(&self, ids: &[String]) -> Result<Vec<MessageRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE id IN ({})",
                MESSAGE_COLUMNS,
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(id_params(ids).as_slice(), map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Newest-first page of live messages. With `before`, only messages created
    /// strictly earlier than that timestamp are returned. With `before_id`,
    /// only messages that sort strictly after that message in
    /// `(created_at, rowid)` order, so equal timestamps are never skipped.
    pub fn list_messages(
        &self,
        conversation_id: &str,
        limit: u32,
        before: Option<&str>,
        before_id: Option<&str>,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages
                 WHERE conversation_id = ?1
                   AND deleted_at IS NULL
                   AND (?2 IS NULL OR created_at < ?2)
                   AND (?4 IS NULL OR (created_at, rowid) <
                        (SELECT created_at, rowid FROM messages WHERE id = ?4))
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![conversation_id, before, limit, before_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Case-insensitive substring search over live message content, newest first.
    /// Both sides go through [`fold_case`], so non-ASCII text matches too.
    pub fn search_messages(&self, conversation_id: &str, needle: &str, limit: u32) -> Result<Vec<MessageRow>> {
        let pattern = format!("%{}%", escape_like(&fold_case(needle)));
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages
                 WHERE conversation_id = ?1
                   AND deleted_at IS NULL
                   AND fold_case(content) LIKE ?2 ESCAPE '\\'
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![conversation_id, pattern, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn pinned_messages(&self, conversation_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM messages
                 WHERE conversation_id = ?1 AND is_pinned = 1 AND deleted_at IS NULL
                 ORDER BY created_at DESC, rowid DESC",
                MESSAGE_COLUMNS
            ))?;
            let rows = stmt
                .query_map([conversation_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The latest live message of each conversation that has one.
    pub fn last_messages(&self, conversation_ids: &[String]) -> Result<Vec<MessageRow>> {
        if conversation_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {cols} FROM (
                     SELECT {cols}, ROW_NUMBER() OVER (
                         PARTITION BY conversation_id ORDER BY created_at DESC, rowid DESC
                     ) AS rn
                     FROM messages
                     WHERE conversation_id IN ({ids}) AND deleted_at IS NULL
                 )
                 WHERE rn = 1",
                cols = MESSAGE_COLUMNS,
                ids = placeholders(1, conversation_ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(id_params(conversation_ids).as_slice(), map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns 0 when the message is missing or already deleted.
    pub fn update_message_content(&self, id: &str, content: &str, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE messages SET content = ?2, updated_at = ?3
                 WHERE id = ?1 AND deleted_at IS NULL",
                [id, content, now],
            )?)
        })
    }

    pub fn soft_delete_message(&self, id: &str, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE messages SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                [id, now],
            )?)
        })
    }

    pub fn set_message_pinned(&self, id: &str, pinned: bool) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE messages SET is_pinned = ?2 WHERE id = ?1 AND deleted_at IS NULL",
                rusqlite::params![id, pinned],
            )?)
        })
    }
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        message_type: row.get(4)?,
        media_ref: row.get(5)?,
        media_thumbnail_ref: row.get(6)?,
        file_name: row.get(7)?,
        file_size: row.get(8)?,
        duration_seconds: row.get(9)?,
        reply_to_id: row.get(10)?,
        forwarded_from_id: row.get(11)?,
        is_pinned: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        deleted_at: row.get(15)?,
    })
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
