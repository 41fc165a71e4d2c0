//! Users, roles, and the role permission table.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Technician,
    Viewer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Technician, Role::Viewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Technician => "technician",
            Role::Viewer => "viewer",
        }
    }

    pub fn permissions(&self) -> Permissions {
        match self {
            Role::Admin => Permissions {
                can_manage_devices: true,
                can_manage_tickets: true,
                can_assign_tickets: true,
                can_view_only: false,
            },
            Role::Technician => Permissions {
                can_manage_devices: true,
                can_manage_tickets: true,
                can_assign_tickets: false,
                can_view_only: false,
            },
            Role::Viewer => Permissions::view_only(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| format!("unknown role '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub display_name: String,
}

/// Capability flags granted by a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub can_manage_devices: bool,
    pub can_manage_tickets: bool,
    pub can_assign_tickets: bool,
    pub can_view_only: bool,
}

impl Permissions {
    /// Permissions of a viewer, also used when nobody is logged in
    pub fn view_only() -> Self {
        Self {
            can_manage_devices: false,
            can_manage_tickets: false,
            can_assign_tickets: false,
            can_view_only: true,
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::ManageDevices => self.can_manage_devices,
            Permission::ManageTickets => self.can_manage_tickets,
            Permission::AssignTickets => self.can_assign_tickets,
            Permission::ViewOnly => self.can_view_only,
        }
    }
}

/// A single named capability, for `has_permission` style checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ManageDevices,
    ManageTickets,
    AssignTickets,
    ViewOnly,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::ManageDevices => "manage devices",
            Permission::ManageTickets => "manage tickets",
            Permission::AssignTickets => "assign tickets",
            Permission::ViewOnly => "view",
        };
        f.write_str(name)
    }
}
