//! Data access layer.
//!
//! Stores depend on the [`TicketsApi`] and [`DevicesApi`] traits so the
//! transport can be swapped; [`ApiClient`] implements both against the REST
//! backend.

mod client;
mod devices;
pub mod error;
mod tickets;

pub use client::{build_list_query, ApiClient, QueryParams, RetryPolicy};
pub use error::ApiError;

use async_trait::async_trait;

use crate::models::{
    AuditLog, CreateDevice, CreateTicket, Device, DeviceStatus, Page, PageRequest, Ticket,
    TicketPriority, TicketStatus, UpdateDevice, UpdateTicket,
};

/// Field filters for the ticket list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TicketFilters {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
}

impl TicketFilters {
    pub fn to_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(status) = self.status {
            params.push(("status".to_string(), status.to_string()));
        }
        if let Some(priority) = self.priority {
            params.push(("priority".to_string(), priority.to_string()));
        }
        params
    }
}

/// Field filters for the device list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceFilters {
    pub status: Option<DeviceStatus>,
}

impl DeviceFilters {
    pub fn to_params(&self) -> QueryParams {
        self.status
            .map(|status| vec![("status".to_string(), status.to_string())])
            .unwrap_or_default()
    }
}

/// Ticket operations offered by the backend
#[async_trait]
pub trait TicketsApi: Send + Sync {
    async fn list_tickets(
        &self,
        page: &PageRequest,
        filters: &TicketFilters,
    ) -> Result<Page<Ticket>, ApiError>;

    async fn get_ticket(&self, id: &str) -> Result<Ticket, ApiError>;

    async fn create_ticket(&self, data: &CreateTicket, created_by: &str) -> Result<Ticket, ApiError>;

    /// Apply a sparse patch. A status transition is a patch with only `status`.
    async fn update_ticket(&self, id: &str, patch: &UpdateTicket) -> Result<Ticket, ApiError>;

    async fn delete_ticket(&self, id: &str) -> Result<(), ApiError>;

    /// Audit history for a ticket, newest first
    async fn ticket_audit_logs(&self, ticket_id: &str) -> Result<Vec<AuditLog>, ApiError>;

    /// Every device, unpaged, for device pickers
    async fn list_all_devices(&self) -> Result<Vec<Device>, ApiError>;
}

/// Device operations offered by the backend
#[async_trait]
pub trait DevicesApi: Send + Sync {
    async fn list_devices(
        &self,
        page: &PageRequest,
        filters: &DeviceFilters,
    ) -> Result<Page<Device>, ApiError>;

    async fn get_device(&self, id: &str) -> Result<Device, ApiError>;

    async fn create_device(&self, data: &CreateDevice) -> Result<Device, ApiError>;

    async fn update_device(&self, id: &str, patch: &UpdateDevice) -> Result<Device, ApiError>;

    async fn delete_device(&self, id: &str) -> Result<(), ApiError>;

    /// Audit history for a device, newest first
    async fn device_audit_logs(&self, device_id: &str) -> Result<Vec<AuditLog>, ApiError>;
}
