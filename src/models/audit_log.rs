use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Device,
    Ticket,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Device => "device",
            EntityType::Ticket => "ticket",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    DeviceCreated,
    DeviceUpdated,
    DeviceStatusChanged,
    TicketCreated,
    TicketUpdated,
    TicketStatusChanged,
    TicketAssigned,
}

impl AuditAction {
    /// Short marker used when printing history
    pub fn glyph(&self) -> &'static str {
        match self {
            AuditAction::DeviceCreated | AuditAction::TicketCreated => "+",
            AuditAction::DeviceUpdated | AuditAction::TicketUpdated => "~",
            AuditAction::DeviceStatusChanged | AuditAction::TicketStatusChanged => "»",
            AuditAction::TicketAssigned => "@",
        }
    }
}

/// Before/after pair for a single changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: serde_json::Value,
    pub new: serde_json::Value,
}

/// One entry of an entity's change history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: AuditAction,
    #[serde(default)]
    pub changes: BTreeMap<String, FieldChange>,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
    pub description: String,
}
