/// Error Handling Module
///
/// One closed error type for the whole crate. Components return the most
/// specific variant they can determine locally; callers branch on
/// `AppError::kind()` and never on message text.
///
/// 1. Domain-specific error types
/// 2. Unified application error + stable kinds
/// 3. Conversions from backend errors (sqlx, redis)
/// 4. Error context for single-point logging

use std::error::Error as StdError;
use std::fmt;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Caller input that can never succeed as given
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// Failures of the relational directories or the key-value store
#[derive(Debug)]
pub enum StorageError {
    UniqueViolation(String),
    NotFound(String),
    Serialization(String),
    Unavailable(BoxError),
    Backend(BoxError),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::UniqueViolation(msg) => write!(f, "Duplicate entry: {}", msg),
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::Unavailable(e) => write!(f, "Storage unavailable: {}", e),
            StorageError::Backend(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            StorageError::Unavailable(e) | StorageError::Backend(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Authentication failures. Deliberately uninformative towards the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    InvalidCredentials,
    InvalidToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
            AuthError::InvalidToken => write!(f, "Invalid token"),
        }
    }
}

impl StdError for AuthError {}

/// Access token signing and verification errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    Signing(String),
    InvalidSignature,
    Expired,
    Malformed(String),
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Signing(msg) => write!(f, "Token signing failed: {}", msg),
            TokenError::InvalidSignature => write!(f, "Token signature is invalid"),
            TokenError::Expired => write!(f, "Token has expired"),
            TokenError::Malformed(msg) => write!(f, "Token is malformed: {}", msg),
        }
    }
}

impl StdError for TokenError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Stable error categories exposed to the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvalidCredentials,
    InvalidToken,
    AlreadyExists,
    TicketAlreadyUsed,
    Timeout,
    Internal,
}

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Storage(StorageError),
    Auth(AuthError),
    Token(TokenError),
    NotFound(String),
    AlreadyExists(String),
    TicketAlreadyUsed,
    /// Deadline exceeded while running the named operation
    Timeout(&'static str),
    Config(String),
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Storage(e) => match e {
                StorageError::UniqueViolation(_) => ErrorKind::AlreadyExists,
                StorageError::NotFound(_) => ErrorKind::NotFound,
                _ => ErrorKind::Internal,
            },
            AppError::Auth(AuthError::InvalidCredentials) => ErrorKind::InvalidCredentials,
            AppError::Auth(AuthError::InvalidToken) => ErrorKind::InvalidToken,
            AppError::Token(TokenError::Signing(_)) => ErrorKind::Internal,
            AppError::Token(_) => ErrorKind::InvalidToken,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            AppError::TicketAlreadyUsed => ErrorKind::TicketAlreadyUsed,
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::Config(_) | AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand to an end user. Internal detail never leaks.
    pub fn public_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "Invalid request",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::InvalidCredentials => "Invalid email or password",
            ErrorKind::InvalidToken => "Invalid or expired token",
            ErrorKind::AlreadyExists => "Resource already exists",
            ErrorKind::TicketAlreadyUsed => "Ticket has already been used",
            ErrorKind::Timeout => "Request timed out",
            ErrorKind::Internal => "Internal server error",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Storage(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Token(e) => write!(f, "{}", e),
            AppError::NotFound(what) => write!(f, "{} not found", what),
            AppError::AlreadyExists(what) => write!(f, "{} already exists", what),
            AppError::TicketAlreadyUsed => write!(f, "Ticket has already been used"),
            AppError::Timeout(op) => write!(f, "Deadline exceeded during {}", op),
            AppError::Config(msg) => write!(f, "Invalid config value: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            AppError::Validation(e) => Some(e),
            AppError::Storage(e) => Some(e),
            AppError::Auth(e) => Some(e),
            AppError::Token(e) => Some(e),
            _ => None,
        }
    }
}

// ============================================================================
// 3. FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        AppError::Token(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let storage = match err {
            sqlx::Error::RowNotFound => StorageError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                StorageError::UniqueViolation(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Unavailable(Box::new(err))
            }
            other => StorageError::Backend(Box::new(other)),
        };
        AppError::Storage(storage)
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            AppError::Storage(StorageError::Unavailable(Box::new(err)))
        } else {
            AppError::Storage(StorageError::Backend(Box::new(err)))
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Storage(StorageError::Serialization(err.to_string()))
    }
}

// ============================================================================
// 4. ERROR CONTEXT
// ============================================================================

/// Operation context for logging an error once, where it is decided
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: &'static str,
    pub user_id: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            user_id: None,
        }
    }

    pub fn with_user_id(mut self, user_id: impl fmt::Display) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn log_error(&self, error: &AppError) {
        let user_id = self.user_id.as_deref().unwrap_or("-");
        match error.kind() {
            ErrorKind::Internal => {
                tracing::error!(
                    operation = self.operation,
                    user_id = user_id,
                    error = %error,
                    source = ?error.source().and_then(|e| e.source()).map(|e| e.to_string()),
                    "Internal error"
                );
            }
            ErrorKind::Timeout => {
                tracing::warn!(
                    operation = self.operation,
                    user_id = user_id,
                    error = %error,
                    "Deadline exceeded"
                );
            }
            ErrorKind::InvalidCredentials | ErrorKind::InvalidToken => {
                tracing::warn!(
                    operation = self.operation,
                    user_id = user_id,
                    error = %error,
                    "Authentication error"
                );
            }
            ErrorKind::TicketAlreadyUsed => {
                tracing::warn!(
                    operation = self.operation,
                    user_id = user_id,
                    error = %error,
                    "Ticket rejected at the gate"
                );
            }
            _ => {
                tracing::debug!(
                    operation = self.operation,
                    user_id = user_id,
                    error = %error,
                    "Request rejected"
                );
            }
        }
    }
}
