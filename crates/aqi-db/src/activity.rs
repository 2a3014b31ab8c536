use crate::Database;
use crate::models::ActivityRow;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

impl Database {
    // -- Activity log --

    pub fn insert_activity(&self, username: &str, action: &str) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO activity_logs (username, action) VALUES (?1, ?2)",
                (username, action),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Newest first. Ids are monotonic, timestamps only have second precision.
    pub fn list_activity(&self) -> Result<Vec<ActivityRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, action, timestamp FROM activity_logs ORDER BY id DESC",
            )?;
            let rows = stmt
                .query_map([], activity_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The author's most recent entry at the moment the feedback was filed.
    /// Anything they logged afterwards, in the same second or not, is ignored.
    pub fn activity_for_feedback(&self, feedback_id: i64) -> Result<Option<ActivityRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT a.id, a.username, a.action, a.timestamp
                     FROM feedback f
                     JOIN activity_logs a ON a.id = f.activity_id
                     WHERE f.id = ?1",
                    [feedback_id],
                    activity_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn clear_activity(&self) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM activity_logs", [])?))
    }
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityRow> {
    Ok(ActivityRow {
        id: row.get(0)?,
        username: row.get(1)?,
        action: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqi_types::models::IssueType;

    #[test]
    fn list_is_newest_first_and_stable() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..5 {
            db.insert_activity("alice", &format!("action {}", i)).unwrap();
        }
        let before = db.list_activity().unwrap();
        assert_eq!(before.len(), 5);
        assert_eq!(before[0].action, "action 4");
        assert_eq!(before[4].action, "action 0");

        db.insert_activity("bob", "action 5").unwrap();
        let after = db.list_activity().unwrap();
        assert_eq!(after.len(), 6);
        assert_eq!(after[0].action, "action 5");
        for (old, new) in before.iter().zip(after[1..].iter()) {
            assert_eq!(old.id, new.id);
            assert_eq!(old.action, new.action);
            assert_eq!(old.timestamp, new.timestamp);
        }
    }

    #[test]
    fn updates_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        let id = db.insert_activity("alice", "Logged in").unwrap();

        let result = db.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE activity_logs SET action = 'tampered' WHERE id = ?1",
                [id],
            )?)
        });
        assert!(result.is_err());
        assert_eq!(db.list_activity().unwrap()[0].action, "Logged in");
    }

    #[test]
    fn feedback_association_picks_latest_prior_entry() {
        let db = Database::open_in_memory().unwrap();
        db.insert_activity("alice", "Logged in").unwrap();
        db.insert_activity("bob", "Logged in").unwrap();
        let latest = db.insert_activity("alice", "Viewed dashboard").unwrap();
        let fid = db
            .insert_feedback("alice", "Delhi", IssueType::AppBug, None)
            .unwrap();

        let entry = db.activity_for_feedback(fid).unwrap().unwrap();
        assert_eq!(entry.id, latest);
        assert_eq!(entry.username, "alice");

        assert!(db.activity_for_feedback(fid + 100).unwrap().is_none());
    }

    #[test]
    fn later_entries_do_not_shift_the_association() {
        let db = Database::open_in_memory().unwrap();
        let before = db.insert_activity("alice", "Logged in").unwrap();
        let fid = db
            .insert_feedback("alice", "Delhi", IssueType::IncorrectData, None)
            .unwrap();
        db.insert_activity("alice", &format!("Submitted feedback #{}", fid)).unwrap();
        db.insert_activity("alice", "Viewed dashboard").unwrap();

        let entry = db.activity_for_feedback(fid).unwrap().unwrap();
        assert_eq!(entry.id, before);
        assert_eq!(entry.action, "Logged in");
    }

    #[test]
    fn author_without_history_has_no_association() {
        let db = Database::open_in_memory().unwrap();
        db.insert_activity("bob", "Logged in").unwrap();
        let fid = db.insert_feedback("alice", "Delhi", IssueType::AppBug, None).unwrap();
        assert!(db.activity_for_feedback(fid).unwrap().is_none());
    }

    #[test]
    fn clear_empties_the_table() {
        let db = Database::open_in_memory().unwrap();
        db.insert_activity("alice", "a").unwrap();
        db.insert_activity("alice", "b").unwrap();
        assert_eq!(db.clear_activity().unwrap(), 2);
        assert!(db.list_activity().unwrap().is_empty());
    }
}
