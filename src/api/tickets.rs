//! Ticket endpoints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::client::ApiClient;
use super::{ApiError, TicketFilters, TicketsApi};
use crate::models::{
    AuditLog, CreateTicket, Device, EntityType, Page, PageRequest, Ticket, TicketStatus,
    UpdateTicket,
};

/// Any patch body, stamped with the modification time
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Stamped<'a, T> {
    #[serde(flatten)]
    pub patch: &'a T,
    pub updated_at: DateTime<Utc>,
}

impl<'a, T> Stamped<'a, T> {
    pub fn now(patch: &'a T) -> Self {
        Self {
            patch,
            updated_at: Utc::now(),
        }
    }
}

/// Query for an entity's audit history, newest first
pub(super) fn audit_log_query(entity_type: EntityType, entity_id: &str) -> Vec<(String, String)> {
    vec![
        ("entityType".to_string(), entity_type.as_str().to_string()),
        ("entityId".to_string(), entity_id.to_string()),
        ("_sort".to_string(), "performedAt".to_string()),
        ("_order".to_string(), "desc".to_string()),
    ]
}

/// Build the full record for a new ticket: it starts `new` and unassigned
fn new_ticket(data: &CreateTicket, created_by: &str, now: DateTime<Utc>) -> Ticket {
    Ticket {
        id: format!("ticket-{}", now.timestamp_millis()),
        title: data.title.clone(),
        description: data.description.clone(),
        status: TicketStatus::New,
        priority: data.priority,
        ticket_type: data.ticket_type,
        device_id: data.device_id.clone(),
        device_name: String::new(),
        assignee_id: None,
        assignee_name: None,
        created_by: created_by.to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl TicketsApi for ApiClient {
    async fn list_tickets(
        &self,
        page: &PageRequest,
        filters: &TicketFilters,
    ) -> Result<Page<Ticket>, ApiError> {
        self.get_paginated("/tickets", page, filters.to_params()).await
    }

    async fn get_ticket(&self, id: &str) -> Result<Ticket, ApiError> {
        self.get(&format!("/tickets/{id}"), Vec::new()).await
    }

    async fn create_ticket(&self, data: &CreateTicket, created_by: &str) -> Result<Ticket, ApiError> {
        let ticket = new_ticket(data, created_by, Utc::now());
        self.post("/tickets", &ticket).await
    }

    async fn update_ticket(&self, id: &str, patch: &UpdateTicket) -> Result<Ticket, ApiError> {
        self.patch(&format!("/tickets/{id}"), &Stamped::now(patch)).await
    }

    async fn delete_ticket(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/tickets/{id}")).await
    }

    async fn ticket_audit_logs(&self, ticket_id: &str) -> Result<Vec<AuditLog>, ApiError> {
        self.get("/auditLogs", audit_log_query(EntityType::Ticket, ticket_id))
            .await
    }

    async fn list_all_devices(&self) -> Result<Vec<Device>, ApiError> {
        self.get("/devices", Vec::new()).await
    }
}
