//! Ticket status lifecycle.
//!
//! ```text
//! new ──► in_progress ──► done
//!             ▲   │         ▲
//!             │   ▼         │
//!         waiting_parts ────┘
//! ```
//!
//! `done` is terminal. Devices have no lifecycle; their status is set freely.

use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::auth::AuthService;
use crate::models::{Permission, Role, TicketStatus};
use crate::operation::OperationToken;
use crate::store::TicketsStore;

/// Statuses a ticket in `status` may move to next
pub fn legal_next_statuses(status: TicketStatus) -> &'static [TicketStatus] {
    match status {
        TicketStatus::New => &[TicketStatus::InProgress],
        TicketStatus::InProgress => &[TicketStatus::WaitingParts, TicketStatus::Done],
        TicketStatus::WaitingParts => &[TicketStatus::InProgress, TicketStatus::Done],
        TicketStatus::Done => &[],
    }
}

pub fn is_legal_transition(from: TicketStatus, to: TicketStatus) -> bool {
    legal_next_statuses(from).contains(&to)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("{} users may not change ticket status", .role.map_or("anonymous", |r| r.as_str()))]
    PermissionDenied { role: Option<Role> },

    #[error("cannot move ticket from '{from}' to '{to}'")]
    IllegalTransition { from: TicketStatus, to: TicketStatus },

    #[error("ticket '{id}' could not be loaded: {reason}")]
    UnknownTicket { id: String, reason: String },
}

/// Offers and requests status changes on behalf of the current user
pub struct TicketLifecycle {
    store: Arc<TicketsStore>,
    auth: Arc<AuthService>,
}

impl TicketLifecycle {
    pub fn new(store: Arc<TicketsStore>, auth: Arc<AuthService>) -> Self {
        Self { store, auth }
    }

    /// Transitions to offer for a ticket in `status`; none without permission
    pub fn offered_transitions(&self, status: TicketStatus) -> &'static [TicketStatus] {
        if self.auth.has_permission(Permission::ManageTickets) {
            legal_next_statuses(status)
        } else {
            &[]
        }
    }

    /// Ask the backend to move `ticket_id` to `target`.
    ///
    /// Rejected requests issue no mutation. Once dispatched, the outcome is
    /// reported on the store's transition slot under `token`; local state
    /// only changes when the backend confirms.
    pub async fn request_transition(
        &self,
        ticket_id: &str,
        target: TicketStatus,
        token: OperationToken,
    ) -> Result<(), LifecycleError> {
        if !self.auth.has_permission(Permission::ManageTickets) {
            return Err(LifecycleError::PermissionDenied {
                role: self.auth.role(),
            });
        }

        let current = match self.store.known_status(ticket_id) {
            Some(status) => status,
            None => {
                self.store.load_ticket(ticket_id).await;
                self.store
                    .known_status(ticket_id)
                    .ok_or_else(|| LifecycleError::UnknownTicket {
                        id: ticket_id.to_string(),
                        reason: self
                            .store
                            .error()
                            .unwrap_or_else(|| "not found".to_string()),
                    })?
            }
        };

        if !is_legal_transition(current, target) {
            warn!(ticket_id, from = %current, to = %target, "Rejected illegal transition");
            return Err(LifecycleError::IllegalTransition {
                from: current,
                to: target,
            });
        }

        self.store.transition_status(ticket_id, target, token).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use TicketStatus::*;
        assert_eq!(legal_next_statuses(New), &[InProgress]);
        assert_eq!(legal_next_statuses(InProgress), &[WaitingParts, Done]);
        assert_eq!(legal_next_statuses(WaitingParts), &[InProgress, Done]);
        assert!(legal_next_statuses(Done).is_empty());
    }

    #[test]
    fn test_done_is_terminal() {
        for target in TicketStatus::ALL {
            assert!(!is_legal_transition(TicketStatus::Done, target));
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for status in TicketStatus::ALL {
            assert!(!is_legal_transition(status, status));
        }
    }

    #[test]
    fn test_nothing_returns_to_new() {
        for from in TicketStatus::ALL {
            assert!(!is_legal_transition(from, TicketStatus::New));
        }
    }

    #[test]
    fn test_permission_error_message() {
        let err = LifecycleError::PermissionDenied {
            role: Some(Role::Viewer),
        };
        assert_eq!(err.to_string(), "viewer users may not change ticket status");
    }
}
