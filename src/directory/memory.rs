/// In-memory Directories
///
/// Uniqueness and the ticket compare-and-set rely on `dashmap` entry locks,
/// which serialise writers per key and leave different keys independent.
/// The manager grant is a single flag claimed with compare-and-swap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use super::{ConditionalUpdate, TicketDirectory, UserDirectory};
use crate::domain::{Credential, NewCredential, Role, Ticket};
use crate::error::{AppError, StorageError};

#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<DashMap<Uuid, Credential>>,
    ids_by_email: Arc<DashMap<String, Uuid>>,
    manager_assigned: Arc<AtomicBool>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove an account, as an administrator deleting a user would.
    pub fn remove(&self, user_id: Uuid) -> Option<Credential> {
        let (_, credential) = self.users.remove(&user_id)?;
        self.ids_by_email.remove(&credential.email);
        Some(credential)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, AppError> {
        let Some(user_id) = self.ids_by_email.get(email).map(|id| *id) else {
            return Ok(None);
        };
        self.find_by_id(user_id).await
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<Credential>, AppError> {
        Ok(self.users.get(&user_id).map(|credential| credential.value().clone()))
    }

    async fn insert(&self, credential: NewCredential) -> Result<Credential, AppError> {
        let slot = match self.ids_by_email.entry(credential.email.clone()) {
            Entry::Occupied(_) => {
                return Err(StorageError::UniqueViolation(
                    "users.email".to_string(),
                )
                .into());
            }
            Entry::Vacant(slot) => slot,
        };

        // The first account ever registered becomes the manager
        let role = if self
            .manager_assigned
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Role::Manager
        } else {
            Role::Attendee
        };
        let now = Utc::now();
        let stored = Credential {
            id: Uuid::new_v4(),
            email: credential.email,
            password_hash: credential.password_hash,
            role,
            profile: credential.profile,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(stored.id, stored.clone());
        slot.insert(stored.id);
        Ok(stored)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketDirectory {
    tickets: Arc<DashMap<Uuid, Ticket>>,
}

impl InMemoryTicketDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ticket, as the booking flow would after purchase.
    pub fn insert(&self, ticket: Ticket) {
        self.tickets.insert(ticket.id, ticket);
    }

    pub fn get(&self, ticket_id: Uuid) -> Option<Ticket> {
        self.tickets.get(&ticket_id).map(|ticket| ticket.value().clone())
    }
}

#[async_trait]
impl TicketDirectory for InMemoryTicketDirectory {
    async fn find_owned(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Ticket>, AppError> {
        Ok(self
            .tickets
            .get(&ticket_id)
            .filter(|ticket| ticket.user_id == user_id)
            .map(|ticket| ticket.value().clone()))
    }

    async fn conditional_set_entered(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ConditionalUpdate>, AppError> {
        let Some(mut ticket) = self.tickets.get_mut(&ticket_id) else {
            return Ok(None);
        };
        if ticket.user_id != user_id {
            return Ok(None);
        }

        let rows_changed = if ticket.entered {
            0
        } else {
            ticket.entered = true;
            ticket.updated_at = Utc::now();
            1
        };

        Ok(Some(ConditionalUpdate {
            ticket: ticket.value().clone(),
            rows_changed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Profile;

    fn new_credential(email: &str) -> NewCredential {
        NewCredential {
            email: email.to_string(),
            password_hash: "$2b$04$hash".to_string(),
            profile: Profile::default(),
        }
    }

    #[tokio::test]
    async fn test_first_user_is_manager() {
        let users = InMemoryUserDirectory::new();

        let first = users.insert(new_credential("first@x.com")).await.unwrap();
        let second = users.insert(new_credential("second@x.com")).await.unwrap();

        assert_eq!(first.role, Role::Manager);
        assert_eq!(second.role, Role::Attendee);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_first_registrations_grant_one_manager() {
        let users = InMemoryUserDirectory::new();
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let inserts = (0..16).map(|i| {
            let users = users.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                users.insert(new_credential(&format!("user{}@x.com", i))).await
            })
        });
        let roles: Vec<Role> = futures::future::join_all(inserts)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap().role)
            .collect();

        assert_eq!(roles.len(), 16);
        assert_eq!(roles.iter().filter(|role| **role == Role::Manager).count(), 1);
    }

    #[tokio::test]
    async fn test_manager_is_not_regranted_after_removal() {
        let users = InMemoryUserDirectory::new();
        let first = users.insert(new_credential("first@x.com")).await.unwrap();
        users.remove(first.id);

        let next = users.insert(new_credential("next@x.com")).await.unwrap();
        assert_eq!(next.role, Role::Attendee);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let users = InMemoryUserDirectory::new();
        users.insert(new_credential("a@x.com")).await.unwrap();

        let err = users.insert(new_credential("a@x.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Storage(StorageError::UniqueViolation(_))));
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_by_email_and_id() {
        let users = InMemoryUserDirectory::new();
        let stored = users.insert(new_credential("a@x.com")).await.unwrap();

        let by_email = users.find_by_email("a@x.com").await.unwrap().unwrap();
        let by_id = users.find_by_id(stored.id).await.unwrap().unwrap();
        assert_eq!(by_email.id, stored.id);
        assert_eq!(by_id.email, "a@x.com");
        assert!(users.find_by_email("b@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_removed_user_disappears() {
        let users = InMemoryUserDirectory::new();
        let stored = users.insert(new_credential("a@x.com")).await.unwrap();

        users.remove(stored.id);

        assert!(users.find_by_id(stored.id).await.unwrap().is_none());
        assert!(users.find_by_email("a@x.com").await.unwrap().is_none());
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn test_find_owned_filters_by_owner() {
        let tickets = InMemoryTicketDirectory::new();
        let owner = Uuid::new_v4();
        let ticket = Ticket::new(owner, Uuid::new_v4());
        tickets.insert(ticket.clone());

        assert!(tickets.find_owned(ticket.id, owner).await.unwrap().is_some());
        assert!(tickets.find_owned(ticket.id, Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conditional_set_entered_changes_once() {
        let tickets = InMemoryTicketDirectory::new();
        let owner = Uuid::new_v4();
        let ticket = Ticket::new(owner, Uuid::new_v4());
        tickets.insert(ticket.clone());

        let first = tickets.conditional_set_entered(ticket.id, owner).await.unwrap().unwrap();
        let second = tickets.conditional_set_entered(ticket.id, owner).await.unwrap().unwrap();

        assert_eq!(first.rows_changed, 1);
        assert!(first.ticket.entered);
        assert_eq!(second.rows_changed, 0);
        assert!(tickets.get(ticket.id).unwrap().entered);
    }

    #[tokio::test]
    async fn test_conditional_set_entered_ignores_foreign_ticket() {
        let tickets = InMemoryTicketDirectory::new();
        let ticket = Ticket::new(Uuid::new_v4(), Uuid::new_v4());
        tickets.insert(ticket.clone());

        let outcome = tickets
            .conditional_set_entered(ticket.id, Uuid::new_v4())
            .await
            .unwrap();

        assert!(outcome.is_none());
        assert!(!tickets.get(ticket.id).unwrap().entered);
    }
}
