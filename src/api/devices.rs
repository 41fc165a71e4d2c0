//! Device endpoints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::client::ApiClient;
use super::tickets::{audit_log_query, Stamped};
use super::{ApiError, DeviceFilters, DevicesApi};
use crate::models::{
    AuditLog, CreateDevice, Device, EntityType, Page, PageRequest, UpdateDevice,
    INITIAL_DEVICE_STATUS, INITIAL_FIRMWARE_VERSION,
};

fn new_device(data: &CreateDevice, now: DateTime<Utc>) -> Device {
    Device {
        id: format!("device-{}", now.timestamp_millis()),
        name: data.name.clone(),
        serial_number: data.serial_number.clone(),
        model: data.model.clone(),
        status: INITIAL_DEVICE_STATUS,
        firmware_version: INITIAL_FIRMWARE_VERSION.to_string(),
        last_seen: now,
        location: data.location.clone(),
        ip_address: data.ip_address.clone(),
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl DevicesApi for ApiClient {
    async fn list_devices(
        &self,
        page: &PageRequest,
        filters: &DeviceFilters,
    ) -> Result<Page<Device>, ApiError> {
        self.get_paginated("/devices", page, filters.to_params()).await
    }

    async fn get_device(&self, id: &str) -> Result<Device, ApiError> {
        self.get(&format!("/devices/{id}"), Vec::new()).await
    }

    async fn create_device(&self, data: &CreateDevice) -> Result<Device, ApiError> {
        self.post("/devices", &new_device(data, Utc::now())).await
    }

    async fn update_device(&self, id: &str, patch: &UpdateDevice) -> Result<Device, ApiError> {
        self.patch(&format!("/devices/{id}"), &Stamped::now(patch)).await
    }

    async fn delete_device(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/devices/{id}")).await
    }

    async fn device_audit_logs(&self, device_id: &str) -> Result<Vec<AuditLog>, ApiError> {
        self.get("/auditLogs", audit_log_query(EntityType::Device, device_id))
            .await
    }
}
