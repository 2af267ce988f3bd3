//! Credential digests and constant-time comparison.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use tokenforge_core::UserId;

/// Digest a password for storage in `UserWasOnBoarded`.
///
/// Salted with the user ID so equal passwords of different users differ.
pub fn hash_password(user_id: &UserId, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_password(user_id: &UserId, password: &str, password_hash: &str) -> bool {
    secrets_match(&hash_password(user_id, password), password_hash)
}

/// Exact, constant-time string comparison.
pub fn secrets_match(provided: &str, stored: &str) -> bool {
    provided.as_bytes().ct_eq(stored.as_bytes()).into()
}
