/// JWT Token Generation and Validation
///
/// Mints and verifies HS256 access tokens. The signing secret is injected at
/// construction and never changes afterwards, so one issuer is shared across
/// all request tasks.

use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::{Claims, Principal};
use crate::configuration::JwtSettings;
use crate::domain::Role;
use crate::error::{AppError, TokenError};

/// Stateless access token issuer
#[derive(Clone)]
pub struct AccessTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    ttl_seconds: i64,
}

impl std::fmt::Debug for AccessTokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenIssuer")
            .field("issuer", &self.issuer)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl AccessTokenIssuer {
    /// # Arguments
    /// * `secret` - Symmetric HMAC secret
    /// * `issuer` - Value of the `iss` claim, checked on verification
    /// * `ttl_seconds` - Access token lifetime
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl_seconds: i64) -> Self {
        let issuer = issuer.into();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);
        // Expiry is exact: a token is dead the second after `exp`
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            issuer,
            ttl_seconds,
        }
    }

    pub fn from_settings(config: &JwtSettings) -> Self {
        Self::new(
            config.secret.as_bytes(),
            config.issuer.clone(),
            config.access_token_expiry,
        )
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Generate a new access token for a user
    ///
    /// # Errors
    /// `TokenError::Signing` if the token cannot be encoded
    pub fn issue(&self, user_id: Uuid, role: Role) -> Result<String, AppError> {
        let claims = Claims::new(user_id, role, self.ttl_seconds, self.issuer.clone());

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()).into())
    }

    /// Validate an access token and return the identity it carries
    ///
    /// # Errors
    /// - `TokenError::InvalidSignature` if the algorithm, signature or issuer
    ///   does not match
    /// - `TokenError::Expired` once `exp` has passed
    /// - `TokenError::Malformed` if the token or its claims cannot be decoded
    pub fn verify(&self, token: &str) -> Result<Principal, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => TokenError::Expired,
                JwtErrorKind::InvalidSignature
                | JwtErrorKind::InvalidAlgorithm
                | JwtErrorKind::InvalidIssuer => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        Ok(claims.principal()?)
    }
}
