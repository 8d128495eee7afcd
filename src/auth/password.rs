/*!
 * # Password hashing and policy
 *
 * Argon2id hashes in PHC string format plus a small strength policy applied
 * on registration and password change.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password too short: minimum {min_length} characters required")]
    TooShort { min_length: usize },

    #[error("Password too long: maximum {max_length} characters allowed")]
    TooLong { max_length: usize },

    #[error("Password must contain at least one letter")]
    MissingLetter,

    #[error("Password must contain at least one number")]
    MissingNumber,

    #[error("Password is in the list of commonly used passwords")]
    CommonPassword,

    #[error("Password must not contain the username")]
    ContainsUsername,
}

#[derive(Debug, Clone)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub max_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 128,
        }
    }
}

lazy_static! {
    static ref COMMON_PASSWORDS: HashSet<&'static str> = [
        "password", "password1", "password123", "12345678", "123456789", "1234567890",
        "qwerty123", "abc12345", "admin123", "letmein1", "welcome1", "iloveyou1",
        "matkhau123", "11111111", "00000000",
    ]
    .into_iter()
    .collect();
}

impl PasswordPolicy {
    pub fn validate(
        &self,
        password: &str,
        username: Option<&str>,
    ) -> Result<(), PasswordPolicyError> {
        let length = password.chars().count();
        if length < self.min_length {
            return Err(PasswordPolicyError::TooShort {
                min_length: self.min_length,
            });
        }
        if length > self.max_length {
            return Err(PasswordPolicyError::TooLong {
                max_length: self.max_length,
            });
        }
        if !password.chars().any(char::is_alphabetic) {
            return Err(PasswordPolicyError::MissingLetter);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingNumber);
        }
        if COMMON_PASSWORDS.contains(password.to_lowercase().as_str()) {
            return Err(PasswordPolicyError::CommonPassword);
        }
        if let Some(username) = username.filter(|u| u.len() >= 3) {
            if password.to_lowercase().contains(&username.to_lowercase()) {
                return Err(PasswordPolicyError::ContainsUsername);
            }
        }
        Ok(())
    }
}

/// Hashes a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// Verifies a password against a stored PHC hash. Malformed hashes never verify.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
