//! Salted PBKDF2-HMAC-SHA256 password hashing.
//!
//! Stored form: `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`. The
//! iteration count travels with the hash, so raising the default does not
//! invalidate existing accounts.

use crate::util::{constant_time_eq, random_hex};

/// Identifier at the front of every stored hash.
const SCHEME: &str = "pbkdf2-sha256";

/// Default number of PBKDF2 rounds for new hashes.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Salt byte length.
const SALT_BYTES: usize = 16;

/// Derived key length.
const KEY_BYTES: usize = 32;

/// Fixed salt used for the dummy hash when an email is unknown.
const DUMMY_SALT: &str = "00000000000000000000000000000000";

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self {
            iterations: iterations.max(1),
        }
    }

    /// Hash a plaintext password with a fresh random salt.
    pub fn hash(&self, password: &str) -> String {
        let salt = random_hex(SALT_BYTES);
        let key = derive(password, &salt, self.iterations);
        format!("{SCHEME}${}${salt}${}", self.iterations, hex::encode(key))
    }

    /// Check a plaintext password against a stored hash. Malformed hashes never match.
    pub fn verify(&self, password: &str, stored: &str) -> bool {
        let mut parts = stored.split('$');
        let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return false;
        };
        if scheme != SCHEME {
            return false;
        }
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        if iterations == 0 {
            return false;
        }

        let attempt = hex::encode(derive(password, salt, iterations));
        constant_time_eq(attempt.as_bytes(), expected.as_bytes())
    }

    /// Spend the same work as a real verification, for unknown accounts.
    pub fn dummy_verify(&self, password: &str) {
        let _ = derive(password, DUMMY_SALT, self.iterations);
    }
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; KEY_BYTES] {
    let mut key = [0u8; KEY_BYTES];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);
    key
}
