//! Accounts, sessions and the post-ownership rule.
//!
//! Provides:
//! - User registration and email + password verification (PBKDF2-HMAC-SHA256, per-user salt)
//! - Session token management (opaque hex tokens, SHA-256 hashed for storage, time-limited)
//! - The `can_modify` ownership check used by post update/delete
//!
//! Everything is persisted in the shared SQLite database (`crate::db`).

pub mod password;
pub mod policy;
pub mod session;
pub mod store;

pub use password::PasswordHasher;
pub use policy::{can_modify, ensure_can_modify};
pub use session::{Principal, SessionManager, SessionTicket};
pub use store::{CredentialStore, User};
