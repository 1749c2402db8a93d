/// Password Hashing and Verification
///
/// Salted, cost-parameterised bcrypt. Hashes are self-describing
/// (`$2b$<cost>$<salt+digest>`), so verification needs no extra state.

use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::{AppError, ValidationError};

/// Bcrypt hasher with a fixed work factor
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// Hash a password using bcrypt
    ///
    /// # Errors
    /// Returns error if:
    /// - Password is empty
    /// - Bcrypt hashing fails (invalid cost, entropy source failure)
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        if password.is_empty() {
            return Err(ValidationError::EmptyField("password".to_string()).into());
        }

        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against its hash
    ///
    /// Any mismatch, including a hash that cannot be parsed, is `false`.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match verify(password, hash) {
            Ok(matches) => matches,
            Err(e) => {
                tracing::debug!("Stored password hash could not be verified: {}", e);
                false
            }
        }
    }
}
