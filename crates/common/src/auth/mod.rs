//! Authentication and authorization utilities
//!
//! Provides:
//! - Shared-secret API key checks
//! - HTTP Basic credential parsing for the admin area
//! - The teacher-proof check behind role downgrade

use crate::db::models::Role;
use crate::errors::{AppError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

/// Compare two secrets without short-circuiting on the first differing byte
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    let a = Sha256::digest(provided.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Validate the raw Authorization header against the configured API secret.
///
/// The header must equal the secret byte for byte; no scheme, no trimming.
pub fn check_api_key(header: Option<&str>, secret: &str) -> Result<()> {
    match header {
        Some(value) if !value.is_empty() && secrets_match(value, secret) => Ok(()),
        Some(_) => Err(AppError::Unauthorized {
            message: "invalid API key".to_string(),
        }),
        None => Err(AppError::Unauthorized {
            message: "missing Authorization header".to_string(),
        }),
    }
}

/// Extract `(username, password)` from a `Basic` Authorization header
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let encoded = header.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Admin area credentials
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    username: String,
    password: String,
}

impl AdminCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Check a raw Authorization header
    pub fn verify(&self, header: Option<&str>) -> Result<()> {
        let (user, pass) = header
            .and_then(parse_basic_auth)
            .ok_or_else(|| AppError::Unauthorized {
                message: "admin credentials required".to_string(),
            })?;

        // Evaluate both so a wrong username costs the same as a wrong password
        let user_ok = secrets_match(&user, &self.username);
        let pass_ok = secrets_match(&pass, &self.password);
        if user_ok && pass_ok {
            Ok(())
        } else {
            Err(AppError::Unauthorized {
                message: "invalid admin credentials".to_string(),
            })
        }
    }
}

/// Decides which role a caller is actually granted
#[derive(Debug, Clone, Default)]
pub struct RoleAuthorizer {
    teacher_key: Option<String>,
}

impl RoleAuthorizer {
    /// An empty key disables the teacher role entirely. The key is used
    /// exactly as configured.
    pub fn new(teacher_key: &str) -> Self {
        Self {
            teacher_key: (!teacher_key.is_empty()).then(|| teacher_key.to_string()),
        }
    }

    /// Effective role for a requested role and optional proof.
    ///
    /// A teacher claim without a matching proof becomes a student, never an error.
    pub fn effective_role(&self, requested: Role, proof: Option<&str>) -> Role {
        match (requested, &self.teacher_key, proof) {
            (Role::Teacher, Some(key), Some(proof)) if secrets_match(proof, key) => Role::Teacher,
            _ => Role::Student,
        }
    }
}
