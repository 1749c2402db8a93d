use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;

use crate::admission::AdmissionController;
use crate::auth::{AccessTokenIssuer, PasswordHasher, RefreshTokenStore, SessionManager};
use crate::configuration::Settings;
use crate::deadline::Deadline;
use crate::directory::{PgTicketDirectory, PgUserDirectory, TicketDirectory, UserDirectory};
use crate::error::AppError;
use crate::store::{KeyValueStore, RedisKeyValueStore};

/// Everything the HTTP layer needs, wired once at process start
#[derive(Clone)]
pub struct Services {
    pub sessions: SessionManager,
    pub admission: AdmissionController,
    pub request_timeout: Duration,
}

impl Services {
    /// Connect Postgres and Redis and construct the services on top of them.
    ///
    /// # Errors
    /// - Config: invalid JWT settings
    /// - Storage: either backend is unreachable
    pub async fn build(configuration: &Settings) -> Result<Self, AppError> {
        configuration.jwt.validate()?;

        tracing::info!("Attempting to connect to database");
        let pool = PgPoolOptions::new()
            .max_connections(configuration.database.max_connections)
            .acquire_timeout(configuration.application.request_timeout())
            .connect(&configuration.database.connection_string())
            .await?;
        tracing::info!("Database connection pool created successfully");

        let key_value = RedisKeyValueStore::connect(&configuration.redis).await?;

        let services = Self::from_parts(
            configuration,
            Arc::new(key_value),
            Arc::new(PgUserDirectory::new(pool.clone())),
            Arc::new(PgTicketDirectory::new(pool)),
        );
        tracing::info!(
            request_timeout_seconds = configuration.application.request_timeout_seconds,
            "Services ready"
        );
        Ok(services)
    }

    /// Wire the services over arbitrary backends.
    pub fn from_parts(
        configuration: &Settings,
        key_value: Arc<dyn KeyValueStore>,
        users: Arc<dyn UserDirectory>,
        tickets: Arc<dyn TicketDirectory>,
    ) -> Self {
        let sessions = SessionManager::new(
            PasswordHasher::new(configuration.password.bcrypt_cost),
            Arc::new(AccessTokenIssuer::from_settings(&configuration.jwt)),
            RefreshTokenStore::new(key_value),
            users,
            configuration.jwt.refresh_token_expiry,
        );

        Self {
            sessions,
            admission: AdmissionController::new(tickets),
            request_timeout: configuration.application.request_timeout(),
        }
    }

    /// Start the deadline for one inbound request
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::get_configuration;
    use crate::directory::{InMemoryTicketDirectory, InMemoryUserDirectory};
    use crate::error::ErrorKind;
    use crate::store::InMemoryKeyValueStore;

    #[tokio::test]
    async fn test_build_rejects_invalid_jwt_settings_before_connecting() {
        let mut configuration = get_configuration().expect("Failed to read configuration.");
        configuration.jwt.secret = String::new();

        let err = match Services::build(&configuration).await {
            Ok(_) => panic!("empty jwt secret should be rejected"),
            Err(e) => e,
        };

        assert!(matches!(err, AppError::Config(_)));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_from_parts_uses_configured_timeout() {
        let mut configuration = get_configuration().expect("Failed to read configuration.");
        configuration.application.request_timeout_seconds = 2;
        configuration.password.bcrypt_cost = 4;

        let services = Services::from_parts(
            &configuration,
            Arc::new(InMemoryKeyValueStore::new()),
            Arc::new(InMemoryUserDirectory::new()),
            Arc::new(InMemoryTicketDirectory::new()),
        );

        assert_eq!(services.request_timeout, Duration::from_secs(2));
    }
}
