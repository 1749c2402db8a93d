/// User and ticket directories backed by the relational store.
///
/// Ownership scoping and uniqueness live here, in the query predicates and
/// constraints, not in the services that call these traits.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Credential, NewCredential, Ticket};
use crate::error::AppError;

mod memory;
mod postgres;

pub use self::memory::{InMemoryTicketDirectory, InMemoryUserDirectory};
pub use self::postgres::{PgTicketDirectory, PgUserDirectory};

#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, AppError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<Credential>, AppError>;

    /// Persist a new account.
    ///
    /// # Errors
    /// `StorageError::UniqueViolation` if the email is already registered.
    async fn insert(&self, credential: NewCredential) -> Result<Credential, AppError>;
}

/// Outcome of a compare-and-set on `tickets.entered`
#[derive(Debug, Clone)]
pub struct ConditionalUpdate {
    /// Ticket state after the attempt
    pub ticket: Ticket,
    /// 1 if this call flipped `entered`, 0 if it was already set
    pub rows_changed: u64,
}

#[async_trait]
pub trait TicketDirectory: Send + Sync + 'static {
    /// Fetch a ticket only if `user_id` owns it.
    async fn find_owned(&self, ticket_id: Uuid, user_id: Uuid)
        -> Result<Option<Ticket>, AppError>;

    /// Set `entered = true` only if it is still `false`, atomically.
    ///
    /// Returns `None` if no ticket with that id is owned by `user_id`.
    async fn conditional_set_entered(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ConditionalUpdate>, AppError>;
}
