//! SQLite-backed credential store.
//!
//! Holds the `users` table: username, email, password hash, avatar filename.
//! Usernames are compared exactly, emails case-insensitively.

use super::password::PasswordHasher;
use crate::db::{self, Database, DEFAULT_IMAGE_FILE};
use crate::error::{BlogError, BlogResult, CredentialField};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Avatar filename under the profile-picture directory.
    pub image_file: String,
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "id, username, email, image_file, created_at";

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_at: String = row.get(4)?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        image_file: row.get(3)?,
        created_at: db::parse_timestamp(4, &created_at)?,
    })
}

pub struct CredentialStore {
    db: Arc<Database>,
    hasher: PasswordHasher,
}

impl CredentialStore {
    pub fn new(db: Arc<Database>, hasher: PasswordHasher) -> Self {
        Self { db, hasher }
    }

    // ── Registration & Login ────────────────────────────────────────

    /// Register a new user. Fails with `DuplicateCredential` when the
    /// username or email already exists.
    pub fn register(&self, username: &str, email: &str, password: &str) -> BlogResult<User> {
        let username = username.trim();
        let email = email.trim();
        self.ensure_available(username, email, None)?;

        let password_hash = self.hasher.hash(password);
        let now = Utc::now().trunc_subsecs(6);

        let conn = self.db.lock();
        let result = conn.execute(
            "INSERT INTO users (username, email, password_hash, image_file, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                username,
                email,
                password_hash,
                DEFAULT_IMAGE_FILE,
                db::format_timestamp(&now)
            ],
        );

        match result {
            Ok(_) => {
                let user = User {
                    id: conn.last_insert_rowid(),
                    username: username.to_string(),
                    email: email.to_string(),
                    image_file: DEFAULT_IMAGE_FILE.to_string(),
                    created_at: now,
                };
                tracing::info!(user_id = user.id, username = %user.username, "User registered");
                Ok(user)
            }
            // Lost a race with a concurrent registration.
            Err(ref e) if db::is_constraint_violation(e) => Err(BlogError::DuplicateCredential {
                field: constraint_field(e),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Check an email + password pair. `None` covers both an unknown email
    /// and a wrong password.
    pub fn verify(&self, email: &str, password: &str) -> BlogResult<Option<User>> {
        let row = {
            let conn = self.db.lock();
            conn.query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                params![email.trim()],
                |row| Ok((user_from_row(row)?, row.get::<_, String>(5)?)),
            )
            .optional()?
        };

        match row {
            Some((user, stored_hash)) => {
                if self.hasher.verify(password, &stored_hash) {
                    Ok(Some(user))
                } else {
                    tracing::debug!(user_id = user.id, "Password mismatch");
                    Ok(None)
                }
            }
            None => {
                // Perform dummy hash to prevent timing side-channel
                self.hasher.dummy_verify(password);
                Ok(None)
            }
        }
    }

    // ── Lookups ─────────────────────────────────────────────────────

    pub fn get_user(&self, user_id: i64) -> BlogResult<Option<User>> {
        self.find_one("id = ?1", &user_id)
    }

    pub fn find_by_username(&self, username: &str) -> BlogResult<Option<User>> {
        self.find_one("username = ?1", &username)
    }

    pub fn find_by_email(&self, email: &str) -> BlogResult<Option<User>> {
        self.find_one("email = ?1", &email.trim())
    }

    fn find_one(&self, predicate: &str, value: &dyn rusqlite::ToSql) -> BlogResult<Option<User>> {
        let conn = self.db.lock();
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}"),
                [value],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Count registered users.
    pub fn user_count(&self) -> BlogResult<u64> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    // ── Profile ─────────────────────────────────────────────────────

    /// Change username/email and optionally the avatar. Uniqueness is
    /// checked against other accounts only, so resubmitting unchanged
    /// values is fine.
    pub fn update_account(
        &self,
        user_id: i64,
        username: &str,
        email: &str,
        image_file: Option<&str>,
    ) -> BlogResult<User> {
        let username = username.trim();
        let email = email.trim();
        self.ensure_available(username, email, Some(user_id))?;

        let updated = {
            let conn = self.db.lock();
            conn.execute(
                "UPDATE users
                 SET username = ?1, email = ?2, image_file = COALESCE(?3, image_file)
                 WHERE id = ?4",
                params![username, email, image_file, user_id],
            )
            .map_err(|e| {
                if db::is_constraint_violation(&e) {
                    BlogError::DuplicateCredential {
                        field: constraint_field(&e),
                    }
                } else {
                    e.into()
                }
            })?
        };
        if updated == 0 {
            return Err(BlogError::NotFound(format!("user {user_id}")));
        }

        tracing::info!(user_id, "Account updated");
        self.get_user(user_id)?
            .ok_or_else(|| BlogError::NotFound(format!("user {user_id}")))
    }

    /// `DuplicateCredential` if the username or email belongs to an account
    /// other than `except`. Username is checked first.
    pub fn ensure_available(
        &self,
        username: &str,
        email: &str,
        except: Option<i64>,
    ) -> BlogResult<()> {
        let foreign = |user: Option<User>| user.is_some_and(|u| Some(u.id) != except);

        if foreign(self.find_by_username(username.trim())?) {
            return Err(BlogError::DuplicateCredential {
                field: CredentialField::Username,
            });
        }
        if foreign(self.find_by_email(email)?) {
            return Err(BlogError::DuplicateCredential {
                field: CredentialField::Email,
            });
        }
        Ok(())
    }
}

/// Map a UNIQUE failure message ("UNIQUE constraint failed: users.email") to its field.
fn constraint_field(err: &rusqlite::Error) -> CredentialField {
    if err.to_string().contains("users.email") {
        CredentialField::Email
    } else {
        CredentialField::Username
    }
}

// ── Tests ───────────────────────────────────────────────────────────
