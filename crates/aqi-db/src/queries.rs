use crate::Database;
use crate::models::{UserRow, parse_column};
use anyhow::Result;
use aqi_types::models::Role;
use rusqlite::{Connection, OptionalExtension, Row, params};

const USER_COLUMNS: &str = "id, username, password, role, subscription, created_at";

impl Database {
    // -- Users --

    /// Insert a user. Returns `false` when the username is already taken;
    /// the check and the insert are one statement.
    pub fn create_user(&self, username: &str, password_hash: &str, role: Role) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (username, password, role) VALUES (?1, ?2, ?3)",
                (username, password_hash, role.as_str()),
            )?;
            Ok(inserted == 1)
        })
    }

    pub fn get_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    pub fn list_users(&self) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))?;
            let rows = stmt
                .query_map([], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_admins(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM users WHERE role = 'admin'",
                [],
                |r| r.get(0),
            )?)
        })
    }

    pub fn update_password(&self, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?2 WHERE username = ?1",
                (username, password_hash),
            )?;
            Ok(n == 1)
        })
    }

    pub fn update_role(&self, username: &str, role: Role) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET role = ?2 WHERE username = ?1",
                (username, role.as_str()),
            )?;
            Ok(n == 1)
        })
    }

    pub fn delete_user(&self, username: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM users WHERE username = ?1", [username])?;
            Ok(n == 1)
        })
    }

    /// Delete every listed user in one statement. Unknown names are ignored.
    pub fn delete_users(&self, usernames: &[String]) -> Result<usize> {
        if usernames.is_empty() {
            return Ok(0);
        }

        let list = json_list(usernames)?;
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM users WHERE username IN (SELECT value FROM json_each(?1))",
                [list],
            )?;
            Ok(n)
        })
    }

    pub fn delete_all_users(&self) -> Result<usize> {
        self.with_conn_mut(|conn| Ok(conn.execute("DELETE FROM users", [])?))
    }

    /// `None` for a missing user, `Some(None)` for a user without an image.
    pub fn get_profile_image(&self, username: &str) -> Result<Option<Option<Vec<u8>>>> {
        self.with_conn(|conn| {
            let image = conn
                .query_row(
                    "SELECT profile_pic FROM users WHERE username = ?1",
                    [username],
                    |row| row.get::<_, Option<Vec<u8>>>(0),
                )
                .optional()?;
            Ok(image)
        })
    }

    pub fn set_profile_image(&self, username: &str, image: &[u8]) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET profile_pic = ?2 WHERE username = ?1",
                params![username, image],
            )?;
            Ok(n == 1)
        })
    }

    pub fn set_subscription(&self, username: &str, subscribed: bool) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE users SET subscription = ?2 WHERE username = ?1",
                params![username, subscribed],
            )?;
            Ok(n == 1)
        })
    }
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
    ))?;
    let row = stmt.query_row([username], user_from_row).optional()?;
    Ok(row)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        role: parse_column(row, 3)?,
        subscription: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// A whole `IN` list bound as one JSON array parameter, read back with
/// `json_each`. Keeps bulk statements clear of SQLite's variable limit.
pub(crate) fn json_list<T: serde::Serialize>(items: &[T]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = db();
        assert!(db.create_user("alice", "h1", Role::User).unwrap());
        assert!(!db.create_user("alice", "h2", Role::Admin).unwrap());

        let users = db.list_users().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].password, "h1");
        assert_eq!(users[0].role, Role::User);
    }

    #[test]
    fn updates_report_missing_users() {
        let db = db();
        assert!(!db.update_password("ghost", "h").unwrap());
        assert!(!db.update_role("ghost", Role::Admin).unwrap());
        assert!(!db.delete_user("ghost").unwrap());
        assert!(!db.set_subscription("ghost", true).unwrap());
        assert!(db.get_profile_image("ghost").unwrap().is_none());
    }

    #[test]
    fn profile_image_roundtrip() {
        let db = db();
        db.create_user("bob", "h", Role::User).unwrap();
        assert_eq!(db.get_profile_image("bob").unwrap(), Some(None));

        assert!(db.set_profile_image("bob", &[0x89, b'P', b'N', b'G']).unwrap());
        assert_eq!(
            db.get_profile_image("bob").unwrap(),
            Some(Some(vec![0x89, b'P', b'N', b'G']))
        );
    }

    #[test]
    fn bulk_delete_ignores_unknown_names() {
        let db = db();
        for name in ["a1", "a2", "a3"] {
            db.create_user(name, "h", Role::User).unwrap();
        }

        let deleted = db
            .delete_users(&["a1".into(), "a3".into(), "nobody".into()])
            .unwrap();
        assert_eq!(deleted, 2);

        let remaining: Vec<String> = db
            .list_users()
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(remaining, vec!["a2".to_string()]);
        assert_eq!(db.delete_users(&[]).unwrap(), 0);
    }

    #[test]
    fn count_admins_tracks_role_changes() {
        let db = db();
        db.create_user("alice", "h", Role::User).unwrap();
        assert_eq!(db.count_admins().unwrap(), 0);

        db.update_role("alice", Role::Admin).unwrap();
        assert_eq!(db.count_admins().unwrap(), 1);
    }

    #[test]
    fn bulk_delete_past_the_variable_limit() {
        let db = db();
        db.create_user("alice", "h", Role::User).unwrap();
        db.create_user("bob", "h", Role::User).unwrap();

        let mut names: Vec<String> = (0..40_000).map(|i| format!("ghost{}", i)).collect();
        names.push("alice".into());
        assert_eq!(db.delete_users(&names).unwrap(), 1);
        assert!(db.get_user("alice").unwrap().is_none());
        assert!(db.get_user("bob").unwrap().is_some());
    }
}
