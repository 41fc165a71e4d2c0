//! End-to-end ticket status workflow against an in-memory backend.
//!
//! Exercises the lifecycle rules, the tickets store and the operation
//! reconciler together, including overlapping transitions that share the
//! transition result slot.

use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use fleetdesk::api::{ApiError, TicketFilters, TicketsApi};
use fleetdesk::auth::AuthService;
use fleetdesk::lifecycle::{LifecycleError, TicketLifecycle};
use fleetdesk::models::{
    AuditLog, CreateTicket, Device, Page, PageMeta, PageRequest, Role, Ticket, TicketPriority,
    TicketStatus, TicketType, UpdateTicket,
};
use fleetdesk::operation::{
    OperationHandlers, OperationResult, OperationStatus, OperationToken, PendingOperation,
};
use fleetdesk::store::TicketsStore;

// ============================================================================
// In-memory backend
// ============================================================================

type Gate = oneshot::Receiver<Result<(), ApiError>>;

/// Ticket backend whose updates can be held open until the test releases them
struct GatedBackend {
    tickets: Mutex<Vec<Ticket>>,
    gates: Mutex<VecDeque<Gate>>,
    update_calls: AtomicUsize,
}

impl GatedBackend {
    fn new(tickets: Vec<Ticket>) -> Self {
        Self {
            tickets: Mutex::new(tickets),
            gates: Mutex::new(VecDeque::new()),
            update_calls: AtomicUsize::new(0),
        }
    }

    /// Hold the next update call until the returned sender fires
    fn hold_next_update(&self) -> oneshot::Sender<Result<(), ApiError>> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }

    fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn status_of(&self, id: &str) -> Option<TicketStatus> {
        self.tickets
            .lock()
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.status)
    }
}

#[async_trait]
impl TicketsApi for GatedBackend {
    async fn list_tickets(
        &self,
        page: &PageRequest,
        _filters: &TicketFilters,
    ) -> Result<Page<Ticket>, ApiError> {
        let data = self.tickets.lock().clone();
        let total = data.len() as u64;
        Ok(Page {
            data,
            meta: PageMeta::from_total(page, total),
        })
    }

    async fn get_ticket(&self, id: &str) -> Result<Ticket, ApiError> {
        self.tickets
            .lock()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| ApiError::http(404, None))
    }

    async fn create_ticket(&self, _: &CreateTicket, _: &str) -> Result<Ticket, ApiError> {
        Err(ApiError::http(501, None))
    }

    async fn update_ticket(&self, id: &str, patch: &UpdateTicket) -> Result<Ticket, ApiError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gates.lock().pop_front();
        if let Some(gate) = gate {
            gate.await
                .unwrap_or_else(|_| Err(ApiError::Network("gate dropped".to_string())))?;
        }

        let mut tickets = self.tickets.lock();
        let ticket = tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| ApiError::http(404, None))?;
        if let Some(status) = patch.status {
            ticket.status = status;
            ticket.updated_at = Utc::now();
        }
        Ok(ticket.clone())
    }

    async fn delete_ticket(&self, _: &str) -> Result<(), ApiError> {
        Ok(())
    }

    async fn ticket_audit_logs(&self, _: &str) -> Result<Vec<AuditLog>, ApiError> {
        Ok(Vec::new())
    }

    async fn list_all_devices(&self) -> Result<Vec<Device>, ApiError> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Test context
// ============================================================================

fn ticket(id: &str, status: TicketStatus) -> Ticket {
    let now = Utc::now();
    Ticket {
        id: id.to_string(),
        title: "Gateway reboot loop".to_string(),
        description: "Restarts every few minutes".to_string(),
        status,
        priority: TicketPriority::High,
        ticket_type: TicketType::Repair,
        device_id: "device-1".to_string(),
        device_name: "Gateway Alpha".to_string(),
        assignee_id: Some("user-2".to_string()),
        assignee_name: Some("John Smith".to_string()),
        created_by: "user-1".to_string(),
        created_at: now,
        updated_at: now,
    }
}

struct WorkflowContext {
    backend: Arc<GatedBackend>,
    store: Arc<TicketsStore>,
    auth: Arc<AuthService>,
    lifecycle: Arc<TicketLifecycle>,
}

impl WorkflowContext {
    async fn new(tickets: Vec<Ticket>, role: Option<Role>) -> Self {
        let backend = Arc::new(GatedBackend::new(tickets));
        let store = Arc::new(TicketsStore::new(backend.clone(), 10));
        let auth = Arc::new(AuthService::in_memory());
        if let Some(role) = role {
            auth.login(role).expect("in-memory login");
        }
        let lifecycle = Arc::new(TicketLifecycle::new(store.clone(), auth.clone()));

        store.load_tickets().await;

        Self {
            backend,
            store,
            auth,
            lifecycle,
        }
    }

    async fn wait_for_update_calls(&self, n: usize) {
        while self.backend.update_calls() < n {
            tokio::task::yield_now().await;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_transition_round_trip() {
    let ctx = WorkflowContext::new(vec![ticket("t-1", TicketStatus::New)], Some(Role::Technician))
        .await;

    let mut pending = PendingOperation::new();
    let mut updates = ctx.store.transition_result().subscribe();
    let token = pending.begin();

    let (requested, outcome) = tokio::join!(
        ctx.lifecycle
            .request_transition("t-1", TicketStatus::InProgress, token.clone()),
        pending.settle(&mut updates),
    );

    assert_eq!(requested, Ok(()));
    assert_eq!(outcome, Some(OperationStatus::Success));
    assert!(!pending.is_busy());
    assert_eq!(ctx.store.known_status("t-1"), Some(TicketStatus::InProgress));
    assert_eq!(ctx.store.transition_result().current(), OperationResult::success(token));
}

#[tokio::test]
async fn test_superseded_observer_is_not_notified() {
    let ctx = WorkflowContext::new(vec![ticket("t-1", TicketStatus::New)], Some(Role::Admin)).await;

    let release_a = ctx.backend.hold_next_update();
    let release_b = ctx.backend.hold_next_update();

    // Observer A issues the first transition
    let mut observer_a = PendingOperation::new();
    let token_a = observer_a.begin_with("t1".into());
    let lifecycle = ctx.lifecycle.clone();
    let call_a = tokio::spawn(async move {
        lifecycle
            .request_transition("t-1", TicketStatus::InProgress, token_a)
            .await
    });
    ctx.wait_for_update_calls(1).await;

    // Observer B re-arms the same slot before A's call resolves
    let mut observer_b = PendingOperation::new();
    let token_b = observer_b.begin_with("t2".into());
    let lifecycle = ctx.lifecycle.clone();
    let call_b = tokio::spawn(async move {
        lifecycle
            .request_transition("t-1", TicketStatus::InProgress, token_b)
            .await
    });
    ctx.wait_for_update_calls(2).await;

    // A's response arrives first and is dropped
    release_a.send(Ok(())).unwrap();
    assert_eq!(call_a.await.unwrap(), Ok(()));
    assert_eq!(
        ctx.store.transition_result().current(),
        OperationResult::armed("t2".into())
    );

    release_b.send(Ok(())).unwrap();
    assert_eq!(call_b.await.unwrap(), Ok(()));

    let result = ctx.store.transition_result().current();
    assert_eq!(result, OperationResult::success("t2".into()));

    let a_notified = Cell::new(false);
    assert!(!observer_a.observe(&result, OperationHandlers::new(|| a_notified.set(true))));
    assert!(!a_notified.get());
    assert!(observer_a.is_busy());

    let b_notified = Cell::new(0);
    assert!(observer_b.observe(&result, OperationHandlers::new(|| b_notified.set(b_notified.get() + 1))));
    assert_eq!(b_notified.get(), 1);
    assert!(!ctx.store.snapshot().transitioning);
}

#[tokio::test]
async fn test_superseded_transition_on_other_ticket_is_still_applied() {
    let ctx = WorkflowContext::new(
        vec![
            ticket("t-1", TicketStatus::New),
            ticket("t-2", TicketStatus::InProgress),
        ],
        Some(Role::Technician),
    )
    .await;

    let release_a = ctx.backend.hold_next_update();
    let release_b = ctx.backend.hold_next_update();

    let lifecycle = ctx.lifecycle.clone();
    let call_a = tokio::spawn(async move {
        lifecycle
            .request_transition("t-1", TicketStatus::InProgress, "t1".into())
            .await
    });
    ctx.wait_for_update_calls(1).await;

    let lifecycle = ctx.lifecycle.clone();
    let call_b = tokio::spawn(async move {
        lifecycle
            .request_transition("t-2", TicketStatus::Done, "t2".into())
            .await
    });
    ctx.wait_for_update_calls(2).await;

    // A's confirmed ticket lands even though B owns the slot
    release_a.send(Ok(())).unwrap();
    assert_eq!(call_a.await.unwrap(), Ok(()));
    assert_eq!(ctx.store.known_status("t-1"), Some(TicketStatus::InProgress));
    assert_eq!(
        ctx.store.transition_result().current(),
        OperationResult::armed("t2".into())
    );
    assert!(ctx.store.snapshot().transitioning);

    release_b.send(Ok(())).unwrap();
    assert_eq!(call_b.await.unwrap(), Ok(()));
    assert_eq!(ctx.store.known_status("t-2"), Some(TicketStatus::Done));
    assert_eq!(
        ctx.store.transition_result().current(),
        OperationResult::success("t2".into())
    );
    assert!(!ctx.store.snapshot().transitioning);

    // later requests are checked against the confirmed status
    let result = ctx
        .lifecycle
        .request_transition("t-1", TicketStatus::InProgress, OperationToken::mint())
        .await;
    assert_eq!(
        result,
        Err(LifecycleError::IllegalTransition {
            from: TicketStatus::InProgress,
            to: TicketStatus::InProgress,
        })
    );
}

#[tokio::test]
async fn test_reset_while_in_flight_still_settles() {
    let ctx = WorkflowContext::new(vec![ticket("t-1", TicketStatus::New)], Some(Role::Technician))
        .await;
    let release = ctx.backend.hold_next_update();

    let mut waiting = PendingOperation::new();
    let token = waiting.begin_with("t1".into());
    let mut updates = ctx.store.transition_result().subscribe();

    let lifecycle = ctx.lifecycle.clone();
    let call = tokio::spawn(async move {
        lifecycle
            .request_transition("t-1", TicketStatus::InProgress, token)
            .await
    });
    ctx.wait_for_update_calls(1).await;

    // detail view torn down while the update is still out
    let mut closed = PendingOperation::new();
    closed.begin_with("t1".into());
    closed.abandon();
    ctx.store.reset_transition_result();
    assert_eq!(ctx.store.transition_result().current(), OperationResult::idle());
    assert!(ctx.store.snapshot().transitioning);

    release.send(Ok(())).unwrap();
    let (requested, outcome) = tokio::join!(call, waiting.settle(&mut updates));

    assert_eq!(requested.unwrap(), Ok(()));
    assert_eq!(outcome, Some(OperationStatus::Success));
    assert!(!ctx.store.snapshot().transitioning);
    assert_eq!(ctx.store.known_status("t-1"), Some(TicketStatus::InProgress));
    assert_eq!(ctx.backend.status_of("t-1"), Some(TicketStatus::InProgress));

    let result = ctx.store.transition_result().current();
    assert_eq!(result, OperationResult::success("t1".into()));
    let applied = Cell::new(false);
    assert!(!closed.observe(&result, OperationHandlers::new(|| applied.set(true))));
    assert!(!applied.get());
}

#[tokio::test]
async fn test_waiting_parts_cannot_return_to_new() {
    let ctx = WorkflowContext::new(
        vec![ticket("t-1", TicketStatus::WaitingParts)],
        Some(Role::Technician),
    )
    .await;

    assert_eq!(
        ctx.lifecycle.offered_transitions(TicketStatus::WaitingParts),
        &[TicketStatus::InProgress, TicketStatus::Done]
    );

    let result = ctx
        .lifecycle
        .request_transition("t-1", TicketStatus::New, OperationToken::mint())
        .await;

    assert_eq!(
        result,
        Err(LifecycleError::IllegalTransition {
            from: TicketStatus::WaitingParts,
            to: TicketStatus::New,
        })
    );
    assert_eq!(ctx.backend.update_calls(), 0);
    assert_eq!(ctx.store.transition_result().current(), OperationResult::idle());
}

#[tokio::test]
async fn test_failed_transition_leaves_status_unchanged() {
    let ctx = WorkflowContext::new(
        vec![ticket("t-1", TicketStatus::InProgress)],
        Some(Role::Technician),
    )
    .await;
    let release = ctx.backend.hold_next_update();
    release
        .send(Err(ApiError::http(503, None)))
        .unwrap();

    let mut pending = PendingOperation::new();
    let token = pending.begin();
    ctx.lifecycle
        .request_transition("t-1", TicketStatus::Done, token)
        .await
        .unwrap();

    let failed = Cell::new(false);
    let succeeded = Cell::new(false);
    let handled = pending.observe(
        &ctx.store.transition_result().current(),
        OperationHandlers::new(|| succeeded.set(true)).on_error(|| failed.set(true)),
    );

    assert!(handled);
    assert!(failed.get());
    assert!(!succeeded.get());
    assert_eq!(ctx.store.known_status("t-1"), Some(TicketStatus::InProgress));
    assert_eq!(ctx.backend.status_of("t-1"), Some(TicketStatus::InProgress));
    assert_eq!(
        ctx.store.error().as_deref(),
        Some("Failed to update ticket status")
    );
}

#[tokio::test]
async fn test_viewer_cannot_transition() {
    let ctx = WorkflowContext::new(vec![ticket("t-1", TicketStatus::New)], Some(Role::Viewer)).await;

    assert!(ctx.lifecycle.offered_transitions(TicketStatus::New).is_empty());
    let result = ctx
        .lifecycle
        .request_transition("t-1", TicketStatus::InProgress, OperationToken::mint())
        .await;

    assert_eq!(
        result,
        Err(LifecycleError::PermissionDenied {
            role: Some(Role::Viewer)
        })
    );
    assert_eq!(ctx.backend.update_calls(), 0);
}

#[tokio::test]
async fn test_logged_out_cannot_transition() {
    let ctx = WorkflowContext::new(vec![ticket("t-1", TicketStatus::New)], None).await;
    assert!(!ctx.auth.is_authenticated());

    let result = ctx
        .lifecycle
        .request_transition("t-1", TicketStatus::InProgress, OperationToken::mint())
        .await;
    assert_eq!(result, Err(LifecycleError::PermissionDenied { role: None }));
}

#[tokio::test]
async fn test_unknown_ticket_is_loaded_then_rejected() {
    let ctx = WorkflowContext::new(Vec::new(), Some(Role::Admin)).await;

    let result = ctx
        .lifecycle
        .request_transition("t-404", TicketStatus::InProgress, OperationToken::mint())
        .await;

    assert_eq!(
        result,
        Err(LifecycleError::UnknownTicket {
            id: "t-404".to_string(),
            reason: "Failed to load ticket".to_string(),
        })
    );
    assert_eq!(ctx.backend.update_calls(), 0);
}

#[tokio::test]
async fn test_abandoned_observer_ignores_late_result() {
    let ctx = WorkflowContext::new(vec![ticket("t-1", TicketStatus::New)], Some(Role::Admin)).await;

    let mut pending = PendingOperation::new();
    let token = pending.begin();
    ctx.lifecycle
        .request_transition("t-1", TicketStatus::InProgress, token)
        .await
        .unwrap();

    // dialog closed before looking at the outcome
    pending.abandon();

    let applied = Cell::new(false);
    assert!(!pending.observe(
        &ctx.store.transition_result().current(),
        OperationHandlers::new(|| applied.set(true)),
    ));
    assert!(!applied.get());
    // the store still applied the confirmed change
    assert_eq!(ctx.store.known_status("t-1"), Some(TicketStatus::InProgress));
}

#[tokio::test]
async fn test_selected_ticket_offers_follow_confirmed_status() {
    let ctx = WorkflowContext::new(vec![ticket("t-1", TicketStatus::New)], Some(Role::Admin)).await;
    ctx.store.load_ticket("t-1").await;
    assert_eq!(ctx.store.can_transition_to(), &[TicketStatus::InProgress]);

    ctx.lifecycle
        .request_transition("t-1", TicketStatus::InProgress, OperationToken::mint())
        .await
        .unwrap();
    assert_eq!(
        ctx.store.can_transition_to(),
        &[TicketStatus::WaitingParts, TicketStatus::Done]
    );

    ctx.lifecycle
        .request_transition("t-1", TicketStatus::Done, OperationToken::mint())
        .await
        .unwrap();
    assert!(ctx.store.can_transition_to().is_empty());
    assert_eq!(ctx.store.tickets_by_status().done, 1);
}
