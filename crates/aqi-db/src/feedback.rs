use crate::Database;
use crate::models::{FeedbackRow, parse_column};
use crate::queries::json_list;
use anyhow::Result;
use aqi_types::models::{FeedbackStatus, IssueType};
use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

const FEEDBACK_COLUMNS: &str = "id, username, city, issue_type, description, status, timestamp";

impl Database {
    // -- Feedback --

    /// New reports always start out `Pending` (column default). The author's
    /// newest activity entry at this moment is pinned on the row.
    pub fn insert_feedback(
        &self,
        username: &str,
        city: &str,
        issue_type: IssueType,
        description: Option<&str>,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO feedback (username, city, issue_type, description, activity_id)
                 VALUES (?1, ?2, ?3, ?4, (SELECT MAX(id) FROM activity_logs WHERE username = ?1))",
                params![username, city, issue_type.as_str(), description],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_feedback(&self, id: i64) -> Result<Option<FeedbackRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {FEEDBACK_COLUMNS} FROM feedback WHERE id = ?1"),
                    [id],
                    feedback_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Newest first, optionally narrowed by status and author.
    pub fn list_feedback(
        &self,
        status: Option<FeedbackStatus>,
        username: Option<&str>,
    ) -> Result<Vec<FeedbackRow>> {
        self.with_conn(|conn| {
            let mut clauses = Vec::new();
            let mut values: Vec<Value> = Vec::new();
            if let Some(status) = status {
                values.push(Value::Text(status.as_str().to_string()));
                clauses.push(format!("status = ?{}", values.len()));
            }
            if let Some(username) = username {
                values.push(Value::Text(username.to_string()));
                clauses.push(format!("username = ?{}", values.len()));
            }

            let mut sql = format!("SELECT {FEEDBACK_COLUMNS} FROM feedback");
            if !clauses.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY id DESC");

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values), feedback_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Flip every listed `Pending` report to `Resolved` in one statement.
    /// Already-resolved and unknown ids are left alone. Returns the number
    /// of reports that changed.
    pub fn resolve_feedback(&self, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let list = json_list(ids)?;
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE feedback SET status = 'Resolved'
                 WHERE status = 'Pending' AND id IN (SELECT value FROM json_each(?1))",
                [list],
            )?;
            Ok(n)
        })
    }
}

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<FeedbackRow> {
    Ok(FeedbackRow {
        id: row.get(0)?,
        username: row.get(1)?,
        city: row.get(2)?,
        issue_type: parse_column(row, 3)?,
        description: row.get(4)?,
        status: parse_column(row, 5)?,
        timestamp: row.get(6)?,
    })
}
