use crate::Database;
use crate::models::Redemption;
use anyhow::Result;
use rusqlite::OptionalExtension;

impl Database {
    // -- Spent tokens --

    pub fn is_token_spent(&self, jti: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM spent_tokens WHERE jti = ?1", [jti], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Mark a token as spent. Returns `false` if it already was.
    pub fn spend_token(&self, jti: &str, purpose: &str, expires_at: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "INSERT OR IGNORE INTO spent_tokens (jti, purpose, expires_at) VALUES (?1, ?2, ?3)",
                (jti, purpose, expires_at),
            )?;
            Ok(n == 1)
        })
    }

    /// Consume a reset token and write the new password hash in one
    /// transaction. Nothing is written unless both steps succeed.
    pub fn redeem_reset_token(
        &self,
        jti: &str,
        expires_at: i64,
        username: &str,
        password_hash: &str,
    ) -> Result<Redemption> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let spent = tx.execute(
                "INSERT OR IGNORE INTO spent_tokens (jti, purpose, expires_at) VALUES (?1, 'reset', ?2)",
                (jti, expires_at),
            )?;
            if spent == 0 {
                return Ok(Redemption::AlreadySpent);
            }

            let updated = tx.execute(
                "UPDATE users SET password = ?2 WHERE username = ?1",
                (username, password_hash),
            )?;
            if updated == 0 {
                return Ok(Redemption::UnknownUser);
            }

            tx.commit()?;
            Ok(Redemption::Redeemed)
        })
    }

    /// Drop spent-token rows whose tokens would have expired anyway.
    pub fn prune_spent_tokens(&self, now: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM spent_tokens WHERE expires_at < ?1", [now])?)
        })
    }
}
