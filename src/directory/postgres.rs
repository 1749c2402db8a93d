/// Postgres Directories
///
/// Row mapping for `users` and `tickets`. Uniqueness comes from the
/// `users.email` constraint; admission is a guarded `UPDATE`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ConditionalUpdate, TicketDirectory, UserDirectory};
use crate::domain::{Credential, NewCredential, Profile, Ticket};
use crate::error::AppError;

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    email: String,
    password_hash: String,
    role: String,
    name: String,
    surname: String,
    birthday: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = AppError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        Ok(Credential {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse()?,
            profile: Profile {
                name: row.name,
                surname: row.surname,
                birthday: row.birthday,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Advisory lock key held while a user row is inserted
const FIRST_USER_LOCK_KEY: i64 = 0x7469_636b_6574_0001;

const CREDENTIAL_COLUMNS: &str =
    "id, email, password_hash, role, name, surname, birthday, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Credential>, AppError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            CREDENTIAL_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Credential::try_from).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<Credential>, AppError> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            CREDENTIAL_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Credential::try_from).transpose()
    }

    async fn insert(&self, credential: NewCredential) -> Result<Credential, AppError> {
        let mut transaction = self.pool.begin().await?;

        // Serialises concurrent inserts until commit, so the role check below
        // sees every user committed before it
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(FIRST_USER_LOCK_KEY)
            .execute(&mut transaction)
            .await?;

        // The first account ever registered becomes the manager
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, role, name, surname, birthday, created_at, updated_at)
            VALUES (
                $1, $2, $3,
                CASE WHEN EXISTS (SELECT 1 FROM users) THEN 'attendee' ELSE 'manager' END,
                $4, $5, $6, $7, $7
            )
            RETURNING {}
            "#,
            CREDENTIAL_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&credential.email)
        .bind(&credential.password_hash)
        .bind(&credential.profile.name)
        .bind(&credential.profile.surname)
        .bind(credential.profile.birthday)
        .bind(Utc::now())
        .fetch_one(&mut transaction)
        .await?;

        transaction.commit().await?;
        Credential::try_from(row)
    }
}

type TicketRow = (Uuid, Uuid, Uuid, bool, DateTime<Utc>, DateTime<Utc>);

fn ticket_from_row(row: TicketRow) -> Ticket {
    let (id, user_id, event_id, entered, created_at, updated_at) = row;
    Ticket {
        id,
        user_id,
        event_id,
        entered,
        created_at,
        updated_at,
    }
}

#[derive(Debug, Clone)]
pub struct PgTicketDirectory {
    pool: PgPool,
}

impl PgTicketDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketDirectory for PgTicketDirectory {
    async fn find_owned(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Ticket>, AppError> {
        let row = sqlx::query_as::<_, TicketRow>(
            r#"
            SELECT id, user_id, event_id, entered, created_at, updated_at
            FROM tickets
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(ticket_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ticket_from_row))
    }

    async fn conditional_set_entered(
        &self,
        ticket_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ConditionalUpdate>, AppError> {
        // The `entered = false` guard makes this a compare-and-set
        let updated = sqlx::query_as::<_, TicketRow>(
            r#"
            UPDATE tickets
            SET entered = true, updated_at = $3
            WHERE id = $1 AND user_id = $2 AND entered = false
            RETURNING id, user_id, event_id, entered, created_at, updated_at
            "#,
        )
        .bind(ticket_id)
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(Some(ConditionalUpdate {
                ticket: ticket_from_row(row),
                rows_changed: 1,
            }));
        }

        // Nothing changed: either someone else admitted it or it isn't ours
        Ok(self
            .find_owned(ticket_id, user_id)
            .await?
            .map(|ticket| ConditionalUpdate {
                ticket,
                rows_changed: 0,
            }))
    }
}
