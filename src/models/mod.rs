//! Domain types for devices, tickets, users, and audit history.
//!
//! Wire representations follow the REST API: camelCase JSON fields and
//! snake_case enum values.

mod audit_log;
mod device;
mod pagination;
mod ticket;
mod user;

pub use audit_log::{AuditAction, AuditLog, EntityType, FieldChange};
pub use device::{
    CreateDevice, Device, DeviceStatus, UpdateDevice, INITIAL_DEVICE_STATUS,
    INITIAL_FIRMWARE_VERSION,
};
pub use pagination::{Page, PageMeta, PageRequest, SortOrder};
pub use ticket::{
    CreateTicket, StatusCounts, Ticket, TicketPriority, TicketStatus, TicketType, UpdateTicket,
};
pub use user::{Permission, Permissions, Role, User};
