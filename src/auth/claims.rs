/// JWT Claims structure
///
/// Payload of an access token: the subject and role the caller attaches to
/// the request context, plus the standard `iss`/`iat`/`exp` claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Role;
use crate::error::TokenError;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Account role
    pub role: Role,
    /// Issuer
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Identity recovered from a verified access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

impl Claims {
    /// Create new claims for a user
    ///
    /// # Arguments
    /// * `user_id` - User's UUID
    /// * `role` - Role to embed
    /// * `expiry_seconds` - Token lifetime in seconds from now
    /// * `issuer` - Issuer identifier
    pub fn new(user_id: Uuid, role: Role, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            role,
            iss: issuer,
            iat: now,
            exp: now + expiry_seconds,
        }
    }

    /// Extract user ID from claims
    ///
    /// # Errors
    /// Returns error if `sub` is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub)
            .map_err(|_| TokenError::Malformed("subject is not a user id".to_string()))
    }

    pub fn principal(&self) -> Result<Principal, TokenError> {
        Ok(Principal {
            user_id: self.user_id()?,
            role: self.role,
        })
    }

    /// Check if token has expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, Role::Attendee, 3600, "test".to_string());

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, Role::Attendee);
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_principal_extraction() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, Role::Manager, 3600, "test".to_string());

        let principal = claims.principal().unwrap();
        assert_eq!(principal.user_id, user_id);
        assert_eq!(principal.role, Role::Manager);
    }

    #[test]
    fn test_invalid_user_id() {
        let mut claims = Claims::new(Uuid::new_v4(), Role::Attendee, 3600, "test".to_string());
        claims.sub = "invalid-uuid".to_string();

        assert!(matches!(claims.user_id(), Err(TokenError::Malformed(_))));
    }

    #[test]
    fn test_negative_lifetime_is_expired() {
        let claims = Claims::new(Uuid::new_v4(), Role::Attendee, -60, "test".to_string());
        assert!(claims.is_expired());
    }

    #[test]
    fn test_wire_format_uses_standard_claim_names() {
        let claims = Claims::new(Uuid::new_v4(), Role::Attendee, 3600, "test".to_string());
        let json = serde_json::to_value(&claims).unwrap();

        for key in ["sub", "role", "iss", "iat", "exp"] {
            assert!(json.get(key).is_some(), "missing claim {}", key);
        }
        assert_eq!(json["role"], "attendee");
    }
}
