/// Session Lifecycle
///
/// Registration, login, refresh-token rotation, logout and access-token
/// authentication. Every backend call runs under the caller's deadline.
/// Failures are logged here, once, and returned as typed errors.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::auth::claims::Principal;
use crate::auth::jwt::AccessTokenIssuer;
use crate::auth::password::PasswordHasher;
use crate::auth::refresh_token::RefreshTokenStore;
use crate::deadline::Deadline;
use crate::directory::UserDirectory;
use crate::domain::{Credential, NewCredential, Profile, User};
use crate::error::{AppError, AuthError, ErrorContext, ErrorKind, StorageError, ValidationError};

/// Token pair handed back after login or refresh
#[derive(Clone, Serialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct SessionManager {
    hasher: PasswordHasher,
    issuer: Arc<AccessTokenIssuer>,
    refresh_tokens: RefreshTokenStore,
    users: Arc<dyn UserDirectory>,
    refresh_token_ttl: Duration,
    /// Verified against when the email is unknown, so both login paths pay one bcrypt
    timing_hash: Arc<str>,
}

const TIMING_PASSWORD: &str = "unknown-account-timing-equaliser";

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()).into());
    }
    Ok(email)
}

fn finish<T>(context: &ErrorContext, result: Result<T, AppError>) -> Result<T, AppError> {
    if let Err(ref e) = result {
        context.log_error(e);
    }
    result
}

impl SessionManager {
    /// # Arguments
    /// * `refresh_token_expiry` - Refresh token lifetime in seconds
    pub fn new(
        hasher: PasswordHasher,
        issuer: Arc<AccessTokenIssuer>,
        refresh_tokens: RefreshTokenStore,
        users: Arc<dyn UserDirectory>,
        refresh_token_expiry: i64,
    ) -> Self {
        let timing_hash = hasher.hash(TIMING_PASSWORD).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to prepare login timing hash");
            String::new()
        });

        Self {
            hasher,
            issuer,
            refresh_tokens,
            users,
            refresh_token_ttl: Duration::seconds(refresh_token_expiry),
            timing_hash: timing_hash.into(),
        }
    }

    /// Register a new account
    ///
    /// # Errors
    /// - Validation: empty email or password
    /// - AlreadyExists: the email is taken (pre-check or unique constraint)
    /// - Timeout / Internal: backend failures
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        profile: Profile,
        deadline: &Deadline,
    ) -> Result<User, AppError> {
        let context = ErrorContext::new("user_registration");
        finish(&context, self.try_register(email, password, profile, deadline).await)
    }

    async fn try_register(
        &self,
        email: &str,
        password: &str,
        profile: Profile,
        deadline: &Deadline,
    ) -> Result<User, AppError> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(ValidationError::EmptyField("password".to_string()).into());
        }

        let existing = deadline
            .run("find_user_by_email", self.users.find_by_email(&email))
            .await?;
        if existing.is_some() {
            return Err(AppError::AlreadyExists("user".to_string()));
        }

        let hasher = self.hasher;
        let plaintext = password.to_string();
        let password_hash = deadline
            .run_blocking("hash_password", move || hasher.hash(&plaintext))
            .await?;

        // Two racing registrations both pass the pre-check; the directory's
        // unique constraint decides, and the loser gets the same error.
        let credential = deadline
            .run(
                "insert_user",
                self.users.insert(NewCredential {
                    email,
                    password_hash,
                    profile,
                }),
            )
            .await
            .map_err(|e| match e {
                AppError::Storage(StorageError::UniqueViolation(_)) => {
                    AppError::AlreadyExists("user".to_string())
                }
                other => other,
            })?;

        tracing::info!(user_id = %credential.id, role = %credential.role, "User registered successfully");
        Ok(User::from(&credential))
    }

    /// Authenticate with email and password
    ///
    /// An unknown email and a wrong password produce the same
    /// `InvalidCredentials` error, so callers cannot enumerate accounts.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        deadline: &Deadline,
    ) -> Result<AuthSession, AppError> {
        let context = ErrorContext::new("user_login");
        finish(&context, self.try_login(email, password, deadline).await)
    }

    async fn try_login(
        &self,
        email: &str,
        password: &str,
        deadline: &Deadline,
    ) -> Result<AuthSession, AppError> {
        let email = normalize_email(email)?;

        let credential = deadline
            .run("find_user_by_email", self.users.find_by_email(&email))
            .await?;

        let hasher = self.hasher;
        let plaintext = password.to_string();
        let stored_hash = match &credential {
            Some(credential) => credential.password_hash.clone(),
            None => self.timing_hash.to_string(),
        };
        let password_valid = deadline
            .run_blocking("verify_password", move || {
                Ok(hasher.verify(&plaintext, &stored_hash))
            })
            .await?;

        let credential = match credential {
            Some(credential) if password_valid => credential,
            _ => return Err(AuthError::InvalidCredentials.into()),
        };

        let session = self.issue_session(&credential, deadline).await?;
        tracing::info!(user_id = %credential.id, "User logged in successfully");
        Ok(session)
    }

    /// Exchange a refresh token for a new token pair
    ///
    /// The presented token is revoked before anything new is issued. If the
    /// process dies in between, the session ends; it never forks.
    ///
    /// # Errors
    /// - InvalidToken: unknown, expired, revoked or already rotated token
    /// - NotFound: the owning user was deleted after the token was issued
    pub async fn refresh(
        &self,
        refresh_token: &str,
        deadline: &Deadline,
    ) -> Result<AuthSession, AppError> {
        let context = ErrorContext::new("token_refresh");
        finish(&context, self.try_refresh(refresh_token, deadline).await)
    }

    async fn try_refresh(
        &self,
        refresh_token: &str,
        deadline: &Deadline,
    ) -> Result<AuthSession, AppError> {
        // Lookup and revocation in one atomic step
        let record = deadline
            .run("consume_refresh_token", self.refresh_tokens.consume(refresh_token))
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => AuthError::InvalidToken.into(),
                _ => e,
            })?;

        let credential = deadline
            .run("find_user_by_id", self.users.find_by_id(record.user_id))
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;

        let session = self.issue_session(&credential, deadline).await?;
        tracing::info!(user_id = %credential.id, "Token refreshed successfully");
        Ok(session)
    }

    /// Revoke a refresh token. Unknown tokens are accepted silently.
    pub async fn logout(&self, refresh_token: &str, deadline: &Deadline) -> Result<(), AppError> {
        let context = ErrorContext::new("user_logout");
        let result = deadline
            .run("revoke_refresh_token", self.refresh_tokens.revoke(refresh_token))
            .await;
        if result.is_ok() {
            tracing::info!("Refresh token revoked on logout");
        }
        finish(&context, result)
    }

    /// Verify an access token and return the identity for the request context
    pub fn authenticate(&self, access_token: &str) -> Result<Principal, AppError> {
        let context = ErrorContext::new("access_token_verification");
        let result = self.issuer.verify(access_token);
        if let Ok(principal) = &result {
            tracing::debug!(user_id = %principal.user_id, role = %principal.role, "JWT validated successfully");
        }
        finish(&context, result)
    }

    async fn issue_session(
        &self,
        credential: &Credential,
        deadline: &Deadline,
    ) -> Result<AuthSession, AppError> {
        let access_token = self.issuer.issue(credential.id, credential.role)?;

        let expires_at = Utc::now() + self.refresh_token_ttl;
        let refresh_token = deadline
            .run(
                "create_refresh_token",
                self.refresh_tokens.create(credential.id, expires_at),
            )
            .await?;

        Ok(AuthSession {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.issuer.ttl_seconds(),
            user: User::from(credential),
        })
    }
}
