//! Device list, detail and edit state.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{error_message, Latest};
use crate::api::{DeviceFilters, DevicesApi};
use crate::models::{
    AuditLog, Device, DeviceStatus, PageMeta, PageRequest, SortOrder, UpdateDevice,
};
use crate::operation::{OperationSlot, OperationStatus, OperationToken};

const DEFAULT_SORT_FIELD: &str = "name";

#[derive(Debug, Clone, PartialEq)]
pub struct DevicesState {
    pub devices: Vec<Device>,
    pub selected_device: Option<Device>,
    pub audit_logs: Vec<AuditLog>,
    pub pagination: PageMeta,
    pub loading: bool,
    pub detail_loading: bool,
    pub audit_logs_loading: bool,
    pub updating: bool,
    pub error: Option<String>,
    pub search_query: String,
    pub status_filter: Option<DeviceStatus>,
    pub sort_field: String,
    pub sort_order: SortOrder,
}

impl DevicesState {
    fn new(page_size: u32) -> Self {
        Self {
            devices: Vec::new(),
            selected_device: None,
            audit_logs: Vec::new(),
            pagination: PageMeta::initial(page_size),
            loading: false,
            detail_loading: false,
            audit_logs_loading: false,
            updating: false,
            error: None,
            search_query: String::new(),
            status_filter: None,
            sort_field: DEFAULT_SORT_FIELD.to_string(),
            sort_order: SortOrder::Asc,
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

    fn count(&self, status: DeviceStatus) -> usize {
        self.devices.iter().filter(|d| d.status == status).count()
    }
}

pub struct DevicesStore {
    api: Arc<dyn DevicesApi>,
    state: RwLock<DevicesState>,
    update_result: OperationSlot,
    list_seq: Latest,
    detail_seq: Latest,
    audit_seq: Latest,
}

impl DevicesStore {
    pub fn new(api: Arc<dyn DevicesApi>, page_size: u32) -> Self {
        Self {
            api,
            state: RwLock::new(DevicesState::new(page_size)),
            update_result: OperationSlot::new(),
            list_seq: Latest::default(),
            detail_seq: Latest::default(),
            audit_seq: Latest::default(),
        }
    }

    pub fn snapshot(&self) -> DevicesState {
        self.state.read().clone()
    }

    pub fn update_result(&self) -> &OperationSlot {
        &self.update_result
    }

    pub fn error(&self) -> Option<String> {
        self.state.read().error.clone()
    }

    pub async fn load_devices(&self) {
        let seq = self.list_seq.begin();
        let (request, filters) = {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
            let filters = DeviceFilters {
                status: state.status_filter,
            };
            (state.page_request(), filters)
        };

        let result = self.api.list_devices(&request, &filters).await;
        if !self.list_seq.is_current(seq) {
            debug!("Dropping superseded device list response");
            return;
        }

        let mut state = self.state.write();
        state.loading = false;
        match result {
            Ok(page) => {
                state.devices = page.data;
                state.pagination = page.meta;
            }
            Err(err) => state.error = Some(error_message(&err, "Failed to load devices")),
        }
    }

    pub async fn load_device(&self, id: &str) {
        let seq = self.detail_seq.begin();
        {
            let mut state = self.state.write();
            state.detail_loading = true;
            state.error = None;
        }

        let result = self.api.get_device(id).await;
        if !self.detail_seq.is_current(seq) {
            return;
        }

        let mut state = self.state.write();
        state.detail_loading = false;
        match result {
            Ok(device) => state.selected_device = Some(device),
            Err(err) => state.error = Some(error_message(&err, "Failed to load device")),
        }
    }

    pub async fn load_audit_logs(&self, device_id: &str) {
        let seq = self.audit_seq.begin();
        self.state.write().audit_logs_loading = true;

        let result = self.api.device_audit_logs(device_id).await;
        if !self.audit_seq.is_current(seq) {
            return;
        }

        let mut state = self.state.write();
        state.audit_logs_loading = false;
        match result {
            Ok(logs) => state.audit_logs = logs,
            Err(err) => warn!(device_id, error = %err, "Failed to load audit logs"),
        }
    }

    /// Patch a device, reporting on the update slot under `token`
    pub async fn update_device(&self, id: &str, patch: &UpdateDevice, token: OperationToken) {
        {
            let mut state = self.state.write();
            state.updating = true;
            state.error = None;
            self.update_result.arm(token.clone());
        }

        let result = self.api.update_device(id, patch).await;

        let mut state = self.state.write();
        let superseded = self.update_result.is_superseded(&token);
        let outcome = match result {
            Ok(updated) => {
                info!(device_id = id, operation_id = %token, "Device updated");
                for device in state.devices.iter_mut().filter(|d| d.id == updated.id) {
                    *device = updated.clone();
                }
                if state.selected_device.as_ref().is_some_and(|d| d.id == updated.id) {
                    state.selected_device = Some(updated);
                }
                OperationStatus::Success
            }
            Err(err) if superseded => {
                debug!(device_id = id, operation_id = %token, error = %err, "Superseded device update failed");
                OperationStatus::Error
            }
            Err(err) => {
                state.error = Some(error_message(&err, "Failed to update device"));
                OperationStatus::Error
            }
        };

        if superseded {
            return;
        }
        state.updating = false;
        self.update_result.resolve(&token, outcome);
    }

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

    pub fn set_status_filter(&self, status: Option<DeviceStatus>) {
        let mut state = self.state.write();
        state.status_filter = status;
        state.pagination.current_page = 1;
    }

    pub fn set_sort(&self, field: &str, order: SortOrder) {
        let mut state = self.state.write();
        state.sort_field = field.to_string();
        state.sort_order = order;
    }

    pub fn clear_selected_device(&self) {
        let mut state = self.state.write();
        state.selected_device = None;
        state.audit_logs.clear();
    }

    pub fn clear_error(&self) {
        self.state.write().error = None;
    }

    pub fn reset_update_result(&self) {
        self.update_result.reset();
    }

    pub fn has_devices(&self) -> bool {
        !self.state.read().devices.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        let state = self.state.read();
        !state.loading && state.devices.is_empty()
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

    pub fn online_count(&self) -> usize {
        self.state.read().count(DeviceStatus::Online)
    }

    pub fn offline_count(&self) -> usize {
        self.state.read().count(DeviceStatus::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::models::{CreateDevice, Page};
    use async_trait::async_trait;
    use chrono::Utc;
    use parking_lot::Mutex;

    fn device(id: &str, status: DeviceStatus) -> Device {
        let now = Utc::now();
        Device {
            id: id.to_string(),
            name: format!("Gateway {id}"),
            serial_number: format!("SN-{id}"),
            model: "EdgeNode-500".to_string(),
            status,
            firmware_version: "2.1.0".to_string(),
            last_seen: now,
            location: "Building A - Floor 1".to_string(),
            ip_address: "10.0.0.1".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    struct MemoryApi {
        devices: Mutex<Vec<Device>>,
        reject_updates: bool,
    }

    #[async_trait]
    impl DevicesApi for MemoryApi {
        async fn list_devices(
            &self,
            page: &PageRequest,
            filters: &DeviceFilters,
        ) -> Result<Page<Device>, ApiError> {
            let data: Vec<Device> = self
                .devices
                .lock()
                .iter()
                .filter(|d| filters.status.map_or(true, |s| d.status == s))
                .cloned()
                .collect();
            let total = data.len() as u64;
            Ok(Page {
                data,
                meta: PageMeta::from_total(page, total),
            })
        }

        async fn get_device(&self, id: &str) -> Result<Device, ApiError> {
            self.devices
                .lock()
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .ok_or_else(|| ApiError::http(404, None))
        }

        async fn create_device(&self, _: &CreateDevice) -> Result<Device, ApiError> {
            Err(ApiError::http(405, None))
        }

        async fn update_device(&self, id: &str, patch: &UpdateDevice) -> Result<Device, ApiError> {
            if self.reject_updates {
                return Err(ApiError::http(
                    422,
                    Some("Invalid firmware version".to_string()),
                ));
            }
            let mut devices = self.devices.lock();
            let device = devices
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| ApiError::http(404, None))?;
            if let Some(status) = patch.status {
                device.status = status;
            }
            if let Some(name) = &patch.name {
                device.name = name.clone();
            }
            Ok(device.clone())
        }

        async fn delete_device(&self, _: &str) -> Result<(), ApiError> {
            Ok(())
        }

        async fn device_audit_logs(&self, _: &str) -> Result<Vec<AuditLog>, ApiError> {
            Err(ApiError::http(500, None))
        }
    }

    fn store(devices: Vec<Device>, reject_updates: bool) -> DevicesStore {
        let api = MemoryApi {
            devices: Mutex::new(devices),
            reject_updates,
        };
        DevicesStore::new(Arc::new(api), 10)
    }

    #[tokio::test]
    async fn test_counts_by_status() {
        let store = store(
            vec![
                device("d-1", DeviceStatus::Online),
                device("d-2", DeviceStatus::Online),
                device("d-3", DeviceStatus::Offline),
                device("d-4", DeviceStatus::Maintenance),
            ],
            false,
        );
        assert!(store.is_empty());
        store.load_devices().await;

        assert_eq!(store.online_count(), 2);
        assert_eq!(store.offline_count(), 1);
        assert!(store.is_first_page());
        assert!(store.is_last_page());
    }

    #[tokio::test]
    async fn test_update_replaces_device() {
        let store = store(vec![device("d-1", DeviceStatus::Online)], false);
        store.load_devices().await;
        store.load_device("d-1").await;

        let patch = UpdateDevice {
            status: Some(DeviceStatus::Maintenance),
            ..UpdateDevice::default()
        };
        let token = OperationToken::from("op-1");
        store.update_device("d-1", &patch, token.clone()).await;

        let state = store.snapshot();
        assert_eq!(state.devices[0].status, DeviceStatus::Maintenance);
        assert_eq!(
            state.selected_device.map(|d| d.status),
            Some(DeviceStatus::Maintenance)
        );
        assert_eq!(store.update_result().current().status, OperationStatus::Success);
    }

    #[tokio::test]
    async fn test_rejected_update_records_backend_message() {
        let store = store(vec![device("d-1", DeviceStatus::Online)], true);
        store.load_devices().await;

        let patch = UpdateDevice {
            firmware_version: Some("bogus".to_string()),
            ..UpdateDevice::default()
        };
        store.update_device("d-1", &patch, "op-1".into()).await;

        assert_eq!(store.error().as_deref(), Some("Invalid firmware version"));
        assert_eq!(store.update_result().current().status, OperationStatus::Error);
        assert_eq!(store.snapshot().devices[0].status, DeviceStatus::Online);
    }

    #[tokio::test]
    async fn test_audit_log_failure_is_not_a_store_error() {
        let store = store(Vec::new(), false);
        store.load_audit_logs("d-1").await;
        assert!(!store.has_error());
        assert!(!store.snapshot().audit_logs_loading);
    }

    #[tokio::test]
    async fn test_missing_device_sets_error() {
        let store = store(Vec::new(), false);
        store.load_device("nope").await;
        assert_eq!(store.error().as_deref(), Some("Failed to load device"));
        store.clear_selected_device();
        store.clear_error();
        assert!(!store.has_error());
    }
}
