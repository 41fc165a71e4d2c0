//! Service ticket types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ticket lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    New,
    InProgress,
    WaitingParts,
    Done,
}

impl TicketStatus {
    pub const ALL: [TicketStatus; 4] = [
        TicketStatus::New,
        TicketStatus::InProgress,
        TicketStatus::WaitingParts,
        TicketStatus::Done,
    ];

    /// Wire value used by the REST API and CLI
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::New => "new",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::WaitingParts => "waiting_parts",
            TicketStatus::Done => "done",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketStatus::New => "New",
            TicketStatus::InProgress => "In Progress",
            TicketStatus::WaitingParts => "Waiting Parts",
            TicketStatus::Done => "Done",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown ticket status '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    pub const ALL: [TicketPriority; 4] = [
        TicketPriority::Low,
        TicketPriority::Medium,
        TicketPriority::High,
        TicketPriority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Critical => "critical",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketPriority::Low => "Low",
            TicketPriority::Medium => "Medium",
            TicketPriority::High => "High",
            TicketPriority::Critical => "Critical",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketPriority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| format!("unknown ticket priority '{}'", s))
    }
}

/// Kind of service work a ticket represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    Maintenance,
    Rma,
    Inspection,
    Repair,
}

impl TicketType {
    pub const ALL: [TicketType; 4] = [
        TicketType::Maintenance,
        TicketType::Rma,
        TicketType::Inspection,
        TicketType::Repair,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::Maintenance => "maintenance",
            TicketType::Rma => "rma",
            TicketType::Inspection => "inspection",
            TicketType::Repair => "repair",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TicketType::Maintenance => "Maintenance",
            TicketType::Rma => "RMA",
            TicketType::Inspection => "Inspection",
            TicketType::Repair => "Repair",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TicketType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown ticket type '{}'", s))
    }
}

/// A service ticket raised against a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    pub device_id: String,
    /// Display name of the device; may be empty for freshly created tickets
    #[serde(default)]
    pub device_name: String,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub assignee_name: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// Device name when known, otherwise the raw device id
    pub fn device_display(&self) -> &str {
        if self.device_name.is_empty() {
            &self.device_id
        } else {
            &self.device_name
        }
    }

    pub fn assignee_display(&self) -> &str {
        self.assignee_name.as_deref().unwrap_or("Unassigned")
    }
}

/// Form data for a new ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicket {
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    pub device_id: String,
}

impl CreateTicket {
    /// Form-level validation; returns the first offending field
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.description.trim().is_empty() {
            return Err("description is required".to_string());
        }
        if self.device_id.trim().is_empty() {
            return Err("device is required".to_string());
        }
        Ok(())
    }
}

/// Sparse ticket patch. Absent fields are left untouched by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TicketPriority>,
    /// `Some(None)` unassigns the ticket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<Option<String>>,
}

impl UpdateTicket {
    /// Patch that changes only the status
    pub fn status_only(status: TicketStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Ticket counts per status for the current page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub new: usize,
    pub in_progress: usize,
    pub waiting_parts: usize,
    pub done: usize,
}

impl StatusCounts {
    pub fn tally<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        let mut counts = Self::default();
        for ticket in tickets {
            match ticket.status {
                TicketStatus::New => counts.new += 1,
                TicketStatus::InProgress => counts.in_progress += 1,
                TicketStatus::WaitingParts => counts.waiting_parts += 1,
                TicketStatus::Done => counts.done += 1,
            }
        }
        counts
    }
}
