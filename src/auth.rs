//! Mock authentication.
//!
//! Logging in picks the fixed demo user for a role. The session survives
//! restarts through a small JSON file in the state directory.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Permission, Permissions, Role, User};

const AUTH_FILE: &str = "auth_user.json";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not logged in")]
    NotAuthenticated,

    #[error("role '{role}' may not access this; requires one of: {}", format_roles(.allowed))]
    Forbidden { role: Role, allowed: Vec<Role> },

    #[error("failed to persist login: {0}")]
    Persist(#[from] std::io::Error),

    #[error("failed to encode login: {0}")]
    Encode(#[from] serde_json::Error),
}

fn format_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Demo user signed in for each role
pub fn mock_user(role: Role) -> User {
    let (id, username, display_name) = match role {
        Role::Admin => ("user-1", "admin", "System Admin"),
        Role::Technician => ("user-2", "jsmith", "John Smith"),
        Role::Viewer => ("user-4", "viewer1", "Operations Viewer"),
    };
    User {
        id: id.to_string(),
        username: username.to_string(),
        role,
        display_name: display_name.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct AuthService {
    user: RwLock<Option<User>>,
    session_file: Option<PathBuf>,
}

impl AuthService {
    /// Session held in memory only
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Session persisted under `state_dir`, restoring any previous login.
    ///
    /// A missing or unreadable session file means nobody is logged in.
    pub fn with_state_dir(state_dir: &Path) -> Self {
        let session_file = state_dir.join(AUTH_FILE);
        let user = load_session(&session_file);
        if let Some(user) = &user {
            debug!(user = %user.username, "Restored login");
        }
        Self {
            user: RwLock::new(user),
            session_file: Some(session_file),
        }
    }

    pub fn login(&self, role: Role) -> Result<User, AuthError> {
        let user = mock_user(role);
        if let Some(path) = &self.session_file {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(&user)?)?;
        }
        info!(user = %user.username, role = %role, "Logged in");
        *self.user.write() = Some(user.clone());
        Ok(user)
    }

    pub fn logout(&self) -> Result<(), AuthError> {
        *self.user.write() = None;
        if let Some(path) = &self.session_file {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn user(&self) -> Option<User> {
        self.user.read().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.read().is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.user.read().as_ref().map(|u| u.role)
    }

    /// Permissions for the current role; view-only when logged out
    pub fn permissions(&self) -> Permissions {
        self.role()
            .map(|role| role.permissions())
            .unwrap_or_else(Permissions::view_only)
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().allows(permission)
    }

    /// Gate an action on the current role
    pub fn require_role(&self, allowed: &[Role]) -> Result<User, AuthError> {
        let user = self.user().ok_or(AuthError::NotAuthenticated)?;
        if allowed.contains(&user.role) {
            Ok(user)
        } else {
            Err(AuthError::Forbidden {
                role: user.role,
                allowed: allowed.to_vec(),
            })
        }
    }

    pub fn admin_only(&self) -> Result<User, AuthError> {
        self.require_role(&[Role::Admin])
    }

    pub fn technician_or_admin(&self) -> Result<User, AuthError> {
        self.require_role(&[Role::Admin, Role::Technician])
    }
}

fn load_session(path: &Path) -> Option<User> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(user) => Some(user),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable login file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mock_users() {
        let tech = mock_user(Role::Technician);
        assert_eq!(tech.id, "user-2");
        assert_eq!(tech.display_name, "John Smith");
        assert_eq!(mock_user(Role::Viewer).username, "viewer1");
    }

    #[test]
    fn test_logged_out_is_view_only() {
        let auth = AuthService::in_memory();
        assert!(!auth.is_authenticated());
        assert_eq!(auth.role(), None);
        assert!(auth.has_permission(Permission::ViewOnly));
        assert!(!auth.has_permission(Permission::ManageTickets));
        assert!(matches!(
            auth.technician_or_admin(),
            Err(AuthError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_role_guards() {
        let auth = AuthService::in_memory();
        auth.login(Role::Technician).unwrap();
        assert!(auth.technician_or_admin().is_ok());
        match auth.admin_only() {
            Err(AuthError::Forbidden { role, allowed }) => {
                assert_eq!(role, Role::Technician);
                assert_eq!(allowed, vec![Role::Admin]);
            }
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_login_persists_and_restores() {
        let temp_dir = TempDir::new().unwrap();

        let auth = AuthService::with_state_dir(temp_dir.path());
        let user = auth.login(Role::Admin).unwrap();
        assert!(temp_dir.path().join(AUTH_FILE).exists());

        let restored = AuthService::with_state_dir(temp_dir.path());
        assert_eq!(restored.user(), Some(user));
        assert!(restored.has_permission(Permission::AssignTickets));
    }

    #[test]
    fn test_logout_removes_session_file() {
        let temp_dir = TempDir::new().unwrap();
        let auth = AuthService::with_state_dir(temp_dir.path());
        auth.login(Role::Viewer).unwrap();

        auth.logout().unwrap();
        assert!(!auth.is_authenticated());
        assert!(!temp_dir.path().join(AUTH_FILE).exists());

        // a second logout is harmless
        auth.logout().unwrap();
        assert!(!AuthService::with_state_dir(temp_dir.path()).is_authenticated());
    }

    #[test]
    fn test_corrupt_session_file_means_logged_out() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(AUTH_FILE), "{not json").unwrap();
        let auth = AuthService::with_state_dir(temp_dir.path());
        assert!(!auth.is_authenticated());
    }
}
