//! Password rules and Argon2id hashing for account writes.

use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use argon2::Argon2;

use super::SocialError;

pub const MIN_PASSWORD_CHARS: usize = 8;

pub fn validate_password(password: &str) -> Result<(), SocialError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(SocialError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    Ok(())
}

/// PHC-format Argon2id hash with a fresh salt. Runs on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, SocialError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| SocialError::Internal(format!("Password hashing failed: {e}")))
    })
    .await
    .map_err(|e| SocialError::Internal(format!("Password hashing task failed: {e}")))?
}
