use crate::Database;
use anyhow::Result;
use rusqlite::OptionalExtension;

impl Database {
    // -- Settings --

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    /// Insert or replace; there is only ever one row per key.
    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                (key, value),
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_one_row() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("maintenance_mode").unwrap(), None);

        db.set_setting("maintenance_mode", "true").unwrap();
        db.set_setting("maintenance_mode", "false").unwrap();
        assert_eq!(
            db.get_setting("maintenance_mode").unwrap().as_deref(),
            Some("false")
        );

        let rows: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM settings", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }
}
