// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Salted slow hashing for the admin password.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{
    Error as PasswordHashError, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;

use crate::error::{QuartermasterError, Result};

/// Hash a plaintext password with a fresh random salt
pub fn hash_password(plain: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| QuartermasterError::CryptoError(format!("failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Verify a candidate password against a stored hash
pub fn verify_password(hash: &str, candidate: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        QuartermasterError::DecodeError {
            key: "admin.password",
            message: format!("invalid password hash: {}", e),
        }
    })?;
    match Argon2::default().verify_password(candidate.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(PasswordHashError::Password) => Ok(false),
        Err(e) => Err(QuartermasterError::DecodeError {
            key: "admin.password",
            message: format!("failed to verify password: {}", e),
        }),
    }
}
