use anyhow::Result;

use super::{id_params, placeholders};
use crate::Database;
use crate::models::{PresenceRow, ProfileRow};

impl Database {
    pub fn upsert_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        handle: Option<&str>,
        avatar_ref: Option<&str>,
        now: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, display_name, handle, avatar_ref, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                     display_name = excluded.display_name,
                     handle = excluded.handle,
                     avatar_ref = excluded.avatar_ref,
                     updated_at = excluded.updated_at",
                rusqlite::params![id, display_name, handle, avatar_ref, now],
            )?;
            Ok(())
        })
    }

    /// Batch-fetch profiles for a set of user ids. Unknown ids are skipped.
    pub fn get_profiles(&self, ids: &[String]) -> Result<Vec<ProfileRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, display_name, handle, avatar_ref FROM profiles WHERE id IN ({})",
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(id_params(ids).as_slice(), |row| {
                    Ok(ProfileRow {
                        id: row.get(0)?,
                        display_name: row.get(1)?,
                        handle: row.get(2)?,
                        avatar_ref: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Records a presence change. `last_seen` always moves to `now`, so an
    /// offline profile still reports when it was last around.
    pub fn set_presence(&self, id: &str, is_online: bool, now: &str) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE profiles SET is_online = ?2, last_seen = ?3, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id, is_online, now],
            )?)
        })
    }

    pub fn get_presence(&self, ids: &[String]) -> Result<Vec<PresenceRow>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, is_online, last_seen FROM profiles WHERE id IN ({})",
                placeholders(1, ids.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(id_params(ids).as_slice(), |row| {
                    Ok(PresenceRow {
                        id: row.get(0)?,
                        is_online: row.get(1)?,
                        last_seen: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;

    #[test]
    fn upsert_overwrites_fields() {
        let db = seeded();
        db.upsert_profile(ALICE, Some("Alice B."), None, Some("avatars/a.png"), T0)
            .unwrap();

        let rows = db.get_profiles(&[ALICE.to_string(), "missing".to_string()]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].display_name.as_deref(), Some("Alice B."));
        assert_eq!(rows[0].handle, None);
        assert_eq!(rows[0].avatar_ref.as_deref(), Some("avatars/a.png"));
    }

    #[test]
    fn presence_starts_unknown_and_tracks_last_change() {
        let db = seeded();
        let ids = [ALICE.to_string(), BOB.to_string()];
        let fresh = db.get_presence(&ids).unwrap();
        assert_eq!(fresh.len(), 2);
        assert!(fresh.iter().all(|p| !p.is_online && p.last_seen.is_none()));

        let later = "2026-01-01T00:05:00.000000Z";
        assert_eq!(db.set_presence(ALICE, true, T0).unwrap(), 1);
        assert_eq!(db.set_presence(ALICE, false, later).unwrap(), 1);
        assert_eq!(db.set_presence("missing", true, T0).unwrap(), 0);

        let alice = db.get_presence(&ids[..1]).unwrap().remove(0);
        assert!(!alice.is_online);
        assert_eq!(alice.last_seen.as_deref(), Some(later));
    }
}
