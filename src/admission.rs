/// Ticket Admission
///
/// A ticket moves `NotEntered -> Entered` once and never back. The
/// pre-check below only short-circuits the common rescan; the directory's
/// conditional update decides every race.

use std::sync::Arc;

use uuid::Uuid;

use crate::deadline::Deadline;
use crate::directory::TicketDirectory;
use crate::domain::Ticket;
use crate::error::{AppError, ErrorContext};

#[derive(Clone)]
pub struct AdmissionController {
    tickets: Arc<dyn TicketDirectory>,
}

impl AdmissionController {
    pub fn new(tickets: Arc<dyn TicketDirectory>) -> Self {
        Self { tickets }
    }

    /// Admit `ticket_id` at the gate on behalf of `user_id`
    ///
    /// # Errors
    /// - NotFound: no such ticket is owned by `user_id`
    /// - TicketAlreadyUsed: the ticket was admitted before, or a concurrent
    ///   scan won the conditional update
    /// - Timeout / Internal: backend failures
    pub async fn validate_entry(
        &self,
        user_id: Uuid,
        ticket_id: Uuid,
        deadline: &Deadline,
    ) -> Result<Ticket, AppError> {
        let context = ErrorContext::new("ticket_validate_entry").with_user_id(user_id);
        let result = self.try_validate_entry(user_id, ticket_id, deadline).await;
        if let Err(ref e) = result {
            context.log_error(e);
        }
        result
    }

    async fn try_validate_entry(
        &self,
        user_id: Uuid,
        ticket_id: Uuid,
        deadline: &Deadline,
    ) -> Result<Ticket, AppError> {
        let ticket = deadline
            .run("find_owned_ticket", self.tickets.find_owned(ticket_id, user_id))
            .await?
            .ok_or_else(|| AppError::NotFound("ticket".to_string()))?;

        if ticket.entered {
            return Err(AppError::TicketAlreadyUsed);
        }

        let outcome = deadline
            .run(
                "set_ticket_entered",
                self.tickets.conditional_set_entered(ticket_id, user_id),
            )
            .await?
            .ok_or_else(|| AppError::NotFound("ticket".to_string()))?;

        // A concurrent scan won the conditional update
        if outcome.rows_changed == 0 {
            return Err(AppError::TicketAlreadyUsed);
        }

        tracing::info!(
            user_id = %user_id,
            ticket_id = %ticket_id,
            event_id = %outcome.ticket.event_id,
            "Ticket admitted"
        );
        Ok(outcome.ticket)
    }
}
