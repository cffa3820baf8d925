//! Trigger authentication utilities
//!
//! Scan triggers are called by an external scheduler holding a shared
//! secret. Provides:
//! - Bearer token extraction
//! - Digest comparison of the presented token against the configured secret

use crate::errors::{AppError, Result};
use sha2::{Digest, Sha256};

/// Hash a secret for comparison
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Check a raw Authorization header against the configured secret.
///
/// `None` for `expected` means the triggers are open.
pub fn verify_trigger(auth_header: Option<&str>, expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let token = auth_header
        .and_then(extract_bearer)
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing bearer token".to_string(),
        })?;

    if hash_secret(token) == hash_secret(expected) {
        Ok(())
    } else {
        Err(AppError::Unauthorized {
            message: "Invalid trigger secret".to_string(),
        })
    }
}
