//! Session manager: opaque tokens mapped to the logged-in principal.
//!
//! Tokens are 32 random bytes, hex-encoded, handed to the browser once and
//! stored server-side only as their SHA-256. "Remember me" sessions get the
//! long TTL and a persistent cookie; the rest last `session_ttl` and live in
//! a browser-session cookie.

use super::store::User;
use crate::db::{self, Database};
use crate::error::BlogResult;
use crate::util::{epoch_secs, random_hex};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

/// Token byte length before hex encoding (32 bytes = 64 hex chars).
const TOKEN_BYTES: usize = 32;

/// Who is making the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Principal {
    #[default]
    Anonymous,
    User(User),
}

impl Principal {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::User(user) => Some(user),
            Self::Anonymous => None,
        }
    }
}

/// What the browser gets back from a successful login.
#[derive(Debug, Clone)]
pub struct SessionTicket {
    /// Plaintext token, only revealed once.
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Persistent cookie when true, browser-session cookie otherwise.
    pub remember: bool,
}

impl SessionTicket {
    /// Seconds the cookie should live, for persistent cookies.
    pub fn max_age_secs(&self) -> Option<i64> {
        self.remember
            .then(|| (self.expires_at - Utc::now()).num_seconds().max(0))
    }
}

pub struct SessionManager {
    db: Arc<Database>,
    session_ttl: Duration,
    remember_ttl: Duration,
}

impl SessionManager {
    pub fn new(db: Arc<Database>, session_ttl: Duration, remember_ttl: Duration) -> Self {
        Self {
            db,
            session_ttl,
            remember_ttl,
        }
    }

    /// Start a session for an already-verified user.
    pub fn login(&self, user: &User, remember: bool) -> BlogResult<SessionTicket> {
        let token = random_hex(TOKEN_BYTES);
        let ttl = if remember {
            self.remember_ttl
        } else {
            self.session_ttl
        };
        let now = epoch_secs();
        let expires_at = now.saturating_add(ttl.as_secs());

        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO sessions (token_hash, user_id, remember, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                hash_token(&token),
                user.id,
                remember,
                to_i64(now),
                to_i64(expires_at)
            ],
        )?;
        tracing::info!(user_id = user.id, remember, "Session started");

        Ok(SessionTicket {
            token,
            expires_at: DateTime::from_timestamp(to_i64(expires_at), 0).unwrap_or_else(Utc::now),
            remember,
        })
    }

    /// Revoke a session. Returns whether it existed.
    pub fn logout(&self, token: &str) -> BlogResult<bool> {
        let conn = self.db.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![hash_token(token)],
        )?;
        Ok(deleted > 0)
    }

    /// Resolve a cookie token to the principal behind it. Missing, unknown
    /// and expired tokens all resolve to `Anonymous`.
    pub fn current_principal(&self, token: Option<&str>) -> BlogResult<Principal> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(Principal::Anonymous);
        };

        let conn = self.db.lock();
        let user = conn
            .query_row(
                "SELECT u.id, u.username, u.email, u.image_file, u.created_at
                 FROM sessions s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.token_hash = ?1 AND s.expires_at > ?2",
                params![hash_token(token), to_i64(epoch_secs())],
                |row| {
                    let created_at: String = row.get(4)?;
                    Ok(User {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        email: row.get(2)?,
                        image_file: row.get(3)?,
                        created_at: db::parse_timestamp(4, &created_at)?,
                    })
                },
            )
            .optional()?;

        Ok(user.map_or(Principal::Anonymous, Principal::User))
    }

    /// Revoke every session a user holds except the one behind `keep_token`.
    pub fn revoke_others(&self, user_id: i64, keep_token: &str) -> BlogResult<u64> {
        let conn = self.db.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE user_id = ?1 AND token_hash != ?2",
            params![user_id, hash_token(keep_token)],
        )?;
        Ok(deleted as u64)
    }

    /// Clean up expired sessions.
    pub fn cleanup_expired(&self) -> BlogResult<u64> {
        let conn = self.db.lock();
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            params![to_i64(epoch_secs())],
        )?;
        Ok(deleted as u64)
    }
}

/// Hash a session token with a single SHA-256 pass.
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn to_i64(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}
