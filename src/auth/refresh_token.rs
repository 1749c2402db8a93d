/// Refresh Token Management
///
/// Refresh tokens are:
/// - Cryptographically secure random 64-character strings (~381 bits)
/// - Opaque: no embedded structure, only a lookup key
/// - Stored under a SHA-256 derived key (the plaintext never reaches the store)
/// - Single-use: consumed atomically on refresh (token rotation)
/// - TTL-bound by the key-value store

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{AppError, StorageError, ValidationError};
use crate::store::KeyValueStore;

const REFRESH_TOKEN_LENGTH: usize = 64;
const KEY_NAMESPACE: &str = "rt:";

/// What the store remembers about a refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshTokenRecord {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// Generate a new cryptographically secure refresh token
///
/// The token is returned in plaintext; this is what the client keeps.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hash a refresh token using SHA-256
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn token_key(token: &str) -> String {
    format!("{}{}", KEY_NAMESPACE, hash_token(token))
}

/// Refresh token store over any TTL-capable key-value backend
#[derive(Clone)]
pub struct RefreshTokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl RefreshTokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Create and persist a new refresh token for `user_id`
    ///
    /// # Returns
    /// The plaintext token value
    ///
    /// # Errors
    /// - Validation error if `expires_at` is not in the future
    /// - Storage error if the backend fails or the derived key is taken
    pub async fn create(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let ttl = (expires_at - Utc::now())
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
            .ok_or_else(|| ValidationError::InvalidFormat("refresh token expiry".to_string()))?;

        let token = generate_refresh_token();
        let record = RefreshTokenRecord {
            user_id,
            expires_at,
            revoked: false,
        };
        let payload = serde_json::to_string(&record)?;

        let written = self.store.set_nx(&token_key(&token), &payload, ttl).await?;
        if !written {
            // Only reachable on a 381-bit collision
            return Err(StorageError::UniqueViolation("refresh token key".to_string()).into());
        }

        tracing::debug!(user_id = %user_id, expires_at = %expires_at, "Refresh token stored");
        Ok(token)
    }

    /// Look up a live refresh token
    ///
    /// # Errors
    /// `StorageError::NotFound` if the token is absent, expired or revoked
    pub async fn lookup(&self, token: &str) -> Result<RefreshTokenRecord, AppError> {
        let payload = self.store.get(&token_key(token)).await?;
        Self::live_record(payload)
    }

    /// Atomically look up and revoke a refresh token
    ///
    /// Of several concurrent calls with the same token at most one succeeds.
    ///
    /// # Errors
    /// `StorageError::NotFound` if the token is absent, expired or revoked
    pub async fn consume(&self, token: &str) -> Result<RefreshTokenRecord, AppError> {
        let payload = self.store.take(&token_key(token)).await?;
        Self::live_record(payload)
    }

    /// Revoke a single refresh token. Revoking an unknown token is a no-op.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        self.store.delete(&token_key(token)).await
    }

    fn live_record(payload: Option<String>) -> Result<RefreshTokenRecord, AppError> {
        let payload =
            payload.ok_or_else(|| StorageError::NotFound("refresh token".to_string()))?;
        let record: RefreshTokenRecord = serde_json::from_str(&payload)?;

        if !record.is_live(Utc::now()) {
            return Err(StorageError::NotFound("refresh token".to_string()).into());
        }
        Ok(record)
    }
}
