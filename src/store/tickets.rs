//! Ticket list, detail and mutation state.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{error_message, Latest};
use crate::api::{TicketFilters, TicketsApi};
use crate::lifecycle::legal_next_statuses;
use crate::models::{
    AuditLog, CreateTicket, Device, PageMeta, PageRequest, SortOrder, StatusCounts, Ticket,
    TicketPriority, TicketStatus, UpdateTicket,
};
use crate::operation::{OperationSlot, OperationStatus, OperationToken};

const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Snapshot of everything the ticket views render
#[derive(Debug, Clone, PartialEq)]
pub struct TicketsState {
    pub tickets: Vec<Ticket>,
    pub selected_ticket: Option<Ticket>,
    pub audit_logs: Vec<AuditLog>,
    /// Device choices for the create form
    pub devices: Vec<Device>,
    /// Ticket returned by the most recent successful create
    pub created_ticket: Option<Ticket>,
    pub pagination: PageMeta,
    pub loading: bool,
    pub detail_loading: bool,
    pub audit_logs_loading: bool,
    pub creating: bool,
    pub transitioning: bool,
    pub error: Option<String>,
    pub search_query: String,
    pub status_filter: Option<TicketStatus>,
    pub priority_filter: Option<TicketPriority>,
    pub sort_field: String,
    pub sort_order: SortOrder,
}

impl TicketsState {
    fn new(page_size: u32) -> Self {
        Self {
            tickets: Vec::new(),
            selected_ticket: None,
            audit_logs: Vec::new(),
            devices: Vec::new(),
            created_ticket: None,
            pagination: PageMeta::initial(page_size),
            loading: false,
            detail_loading: false,
            audit_logs_loading: false,
            creating: false,
            transitioning: false,
            error: None,
            search_query: String::new(),
            status_filter: None,
            priority_filter: None,
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_order: SortOrder::Desc,
        }
    }

    fn page_request(&self) -> PageRequest {
        PageRequest {
            page: self.pagination.current_page,
            limit: self.pagination.items_per_page,
            sort: Some(self.sort_field.clone()),
            order: Some(self.sort_order),
            search: Some(self.search_query.clone()).filter(|q| !q.is_empty()),
        }
    }

    fn filters(&self) -> TicketFilters {
        TicketFilters {
            status: self.status_filter,
            priority: self.priority_filter,
        }
    }

    /// Swap in the backend's copy of a ticket wherever it is shown
    fn replace_ticket(&mut self, updated: Ticket) {
        for ticket in self.tickets.iter_mut().filter(|t| t.id == updated.id) {
            *ticket = updated.clone();
        }
        if let Some(selected) = self.selected_ticket.as_mut() {
            if selected.id == updated.id {
                *selected = updated;
            }
        }
    }
}

pub struct TicketsStore {
    api: Arc<dyn TicketsApi>,
    state: RwLock<TicketsState>,
    create_result: OperationSlot,
    transition_result: OperationSlot,
    list_seq: Latest,
    detail_seq: Latest,
    audit_seq: Latest,
    update_seq: Latest,
}

impl TicketsStore {
    pub fn new(api: Arc<dyn TicketsApi>, page_size: u32) -> Self {
        Self {
            api,
            state: RwLock::new(TicketsState::new(page_size)),
            create_result: OperationSlot::new(),
            transition_result: OperationSlot::new(),
            list_seq: Latest::default(),
            detail_seq: Latest::default(),
            audit_seq: Latest::default(),
            update_seq: Latest::default(),
        }
    }

    pub fn snapshot(&self) -> TicketsState {
        self.state.read().clone()
    }

    pub fn create_result(&self) -> &OperationSlot {
        &self.create_result
    }

    pub fn transition_result(&self) -> &OperationSlot {
        &self.transition_result
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    // -- loads --

    pub async fn load_tickets(&self) {
        let seq = self.list_seq.begin();
        let (request, filters) = {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
            (state.page_request(), state.filters())
        };

        let result = self.api.list_tickets(&request, &filters).await;
        if !self.list_seq.is_current(seq) {
            debug!("Dropping superseded ticket list response");
            return;
        }

        let mut state = self.state.write();
        state.loading = false;
        match result {
            Ok(page) => {
                state.tickets = page.data;
                state.pagination = page.meta;
            }
            Err(err) => state.error = Some(error_message(&err, "Failed to load tickets")),
        }
    }

    pub async fn load_ticket(&self, id: &str) {
        let seq = self.detail_seq.begin();
        {
            let mut state = self.state.write();
            state.detail_loading = true;
            state.error = None;
        }

        let result = self.api.get_ticket(id).await;
        if !self.detail_seq.is_current(seq) {
            return;
        }

        let mut state = self.state.write();
        state.detail_loading = false;
        match result {
            Ok(ticket) => state.selected_ticket = Some(ticket),
            Err(err) => state.error = Some(error_message(&err, "Failed to load ticket")),
        }
    }

    /// Audit history for a ticket. Failures leave the previous list in place.
    pub async fn load_audit_logs(&self, ticket_id: &str) {
        let seq = self.audit_seq.begin();
        self.state.write().audit_logs_loading = true;

        let result = self.api.ticket_audit_logs(ticket_id).await;
        if !self.audit_seq.is_current(seq) {
            return;
        }

        let mut state = self.state.write();
        state.audit_logs_loading = false;
        match result {
            Ok(logs) => state.audit_logs = logs,
            Err(err) => warn!(ticket_id, error = %err, "Failed to load audit logs"),
        }
    }

    /// Device choices for the create form; failures are ignored
    pub async fn load_devices(&self) {
        match self.api.list_all_devices().await {
            Ok(devices) => self.state.write().devices = devices,
            Err(err) => debug!(error = %err, "Device choices unavailable"),
        }
    }

    // -- mutations --

    /// Create a ticket, reporting the outcome on the create slot under `token`
    pub async fn create_ticket(&self, data: &CreateTicket, created_by: &str, token: OperationToken) {
        {
            let mut state = self.state.write();
            state.creating = true;
            state.error = None;
            state.created_ticket = None;
            self.create_result.arm(token.clone());
        }

        let result = self.api.create_ticket(data, created_by).await;

        let mut state = self.state.write();
        if self.create_result.is_superseded(&token) {
            if let Ok(ticket) = &result {
                info!(ticket_id = %ticket.id, operation_id = %token, "Ticket created by superseded attempt");
            }
            return;
        }
        state.creating = false;
        match result {
            Ok(ticket) => {
                info!(ticket_id = %ticket.id, operation_id = %token, "Ticket created");
                state.created_ticket = Some(ticket);
                self.create_result.resolve(&token, OperationStatus::Success);
            }
            Err(err) => {
                state.error = Some(error_message(&err, "Failed to create ticket"));
                self.create_result.resolve(&token, OperationStatus::Error);
            }
        }
    }

    /// Apply a general patch. Not tracked by a result slot.
    pub async fn update_ticket(&self, id: &str, patch: &UpdateTicket) {
        let seq = self.update_seq.begin();
        self.state.write().loading = true;

        let result = self.api.update_ticket(id, patch).await;
        if !self.update_seq.is_current(seq) {
            return;
        }

        let mut state = self.state.write();
        state.loading = false;
        match result {
            Ok(ticket) => state.replace_ticket(ticket),
            Err(err) => state.error = Some(error_message(&err, "Failed to update ticket")),
        }
    }

    /// Move a ticket to `status`, reporting on the transition slot under `token`.
    ///
    /// Local state changes only after the backend confirms; on failure the
    /// ticket keeps its previous status. A confirmed ticket is always applied,
    /// even when a newer transition has taken over the slot.
    pub async fn transition_status(&self, id: &str, status: TicketStatus, token: OperationToken) {
        {
            let mut state = self.state.write();
            state.transitioning = true;
            state.error = None;
            self.transition_result.arm(token.clone());
        }

        let result = self
            .api
            .update_ticket(id, &UpdateTicket::status_only(status))
            .await;

        let mut state = self.state.write();
        let superseded = self.transition_result.is_superseded(&token);
        let outcome = match result {
            Ok(ticket) => {
                info!(ticket_id = id, status = %ticket.status, operation_id = %token, "Ticket status changed");
                state.replace_ticket(ticket);
                OperationStatus::Success
            }
            Err(err) if superseded => {
                debug!(ticket_id = id, operation_id = %token, error = %err, "Superseded transition failed");
                OperationStatus::Error
            }
            Err(err) => {
                state.error = Some(error_message(&err, "Failed to update ticket status"));
                OperationStatus::Error
            }
        };

        // the newer attempt owns the busy flag and the slot
        if superseded {
            return;
        }
        state.transitioning = false;
        if outcome == OperationStatus::Success {
            state.error = None;
        }
        self.transition_result.resolve(&token, outcome);
    }

    // -- view setters --

    pub fn set_page(&self, page: u32) {
        self.state.write().pagination.current_page = page;
    }

    pub fn set_page_size(&self, size: u32) {
        let mut state = self.state.write();
        state.pagination.items_per_page = size;
        state.pagination.current_page = 1;
    }

    pub fn set_search(&self, query: &str) {
        let mut state = self.state.write();
        state.search_query = query.to_string();
        state.pagination.current_page = 1;
    }

    pub fn set_status_filter(&self, status: Option<TicketStatus>) {
        let mut state = self.state.write();
        state.status_filter = status;
        state.pagination.current_page = 1;
    }

    pub fn set_priority_filter(&self, priority: Option<TicketPriority>) {
        let mut state = self.state.write();
        state.priority_filter = priority;
        state.pagination.current_page = 1;
    }

    pub fn set_sort(&self, field: &str, order: SortOrder) {
        let mut state = self.state.write();
        state.sort_field = field.to_string();
        state.sort_order = order;
    }

    pub fn clear_selected_ticket(&self) {
        let mut state = self.state.write();
        state.selected_ticket = None;
        state.audit_logs.clear();
    }

    pub fn clear_error(&self) {
        self.state.write().error = None;
    }

    pub fn reset_create_result(&self) {
        self.create_result.reset();
    }

    pub fn reset_transition_result(&self) {
        self.transition_result.reset();
    }

    // -- derived --

    pub fn has_tickets(&self) -> bool {
        !self.state.read().tickets.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.read();
        !state.loading && state.tickets.is_empty()
    }

    pub fn has_error(&self) -> bool {
        self.state.read().error.is_some()
    }

    pub fn is_first_page(&self) -> bool {
        self.state.read().pagination.is_first_page()
    }

    pub fn is_last_page(&self) -> bool {
        self.state.read().pagination.is_last_page()
    }

    pub fn tickets_by_status(&self) -> StatusCounts {
        StatusCounts::tally(&self.state.read().tickets)
    }

    /// Statuses the selected ticket may move to next
    pub fn can_transition_to(&self) -> &'static [TicketStatus] {
        self.state
            .read()
            .selected_ticket
            .as_ref()
            .map(|t| legal_next_statuses(t.status))
            .unwrap_or(&[])
    }

    /// Last status this store saw for a ticket, from the detail view or the list
    pub fn known_status(&self, id: &str) -> Option<TicketStatus> {
        let state = self.state.read();
        state
            .selected_ticket
            .iter()
            .chain(state.tickets.iter())
            .find(|t| t.id == id)
            .map(|t| t.status)
    }
}
