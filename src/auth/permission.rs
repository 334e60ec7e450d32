//! Method-to-role permission table (spec §4.9).

use std::collections::HashMap;

use parking_lot::Mutex;

use super::token::Role;

pub struct PermissionTable {
    required_role: Mutex<HashMap<String, Role>>,
}

impl PermissionTable {
    pub fn new() -> Self {
        let mut table = HashMap::new();
        for method in VIEWER_METHODS {
            table.insert((*method).to_string(), Role::Viewer);
        }
        for method in OPERATOR_METHODS {
            table.insert((*method).to_string(), Role::Operator);
        }
        for method in ADMIN_METHODS {
            table.insert((*method).to_string(), Role::Admin);
        }
        Self {
            required_role: Mutex::new(table),
        }
    }

    pub fn has_permission(&self, role: Role, method: &str) -> bool {
        role.rank() >= self.get_required_role(method).rank()
    }

    /// Unknown or whitespace-only methods default to requiring admin.
    pub fn get_required_role(&self, method: &str) -> Role {
        if method.trim().is_empty() {
            return Role::Admin;
        }
        self.required_role
            .lock()
            .get(method)
            .copied()
            .unwrap_or(Role::Admin)
    }

    pub fn add_method_permission(&self, method: &str, role: Role) -> crate::error::Result<()> {
        if method.trim().is_empty() {
            return Err(crate::error::AppError::BadRequest(
                "method cannot be empty".to_string(),
            ));
        }
        self.required_role.lock().insert(method.to_string(), role);
        Ok(())
    }

    pub fn remove_method_permission(&self, method: &str) {
        self.required_role.lock().remove(method);
    }

    pub fn is_known_method(&self, method: &str) -> bool {
        self.required_role.lock().contains_key(method)
    }
}

impl Default for PermissionTable {
    fn default() -> Self {
        Self::new()
    }
}

pub const VIEWER_METHODS: &[&str] = &[
    "ping",
    "authenticate",
    "get_camera_list",
    "get_camera_status",
    "get_camera_capabilities",
    "get_server_info",
    "list_recordings",
    "list_snapshots",
    "get_recording_info",
    "get_snapshot_info",
];

pub const OPERATOR_METHODS: &[&str] = &[
    "take_snapshot",
    "start_recording",
    "stop_recording",
    "delete_recording",
    "delete_snapshot",
    "set_retention_policy",
    "cleanup_old_files",
];

pub const ADMIN_METHODS: &[&str] = &["get_metrics", "get_status", "get_streams", "get_storage_info"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_method_requires_admin() {
        let table = PermissionTable::new();
        assert_eq!(table.get_required_role("no_such_method"), Role::Admin);
        assert!(!table.has_permission(Role::Operator, "no_such_method"));
    }

    #[test]
    fn operator_methods_allow_operator_and_admin_not_viewer() {
        let table = PermissionTable::new();
        assert!(table.has_permission(Role::Operator, "start_recording"));
        assert!(table.has_permission(Role::Admin, "start_recording"));
        assert!(!table.has_permission(Role::Viewer, "start_recording"));
    }

    #[test]
    fn remove_after_add_leaves_no_record() {
        // After removal the method falls back to the unknown-method default
        // (requires admin), so every non-admin role is denied.
        let table = PermissionTable::new();
        table.add_method_permission("custom_method", Role::Viewer).unwrap();
        assert!(table.has_permission(Role::Viewer, "custom_method"));
        table.remove_method_permission("custom_method");
        assert!(!table.has_permission(Role::Viewer, "custom_method"));
        assert!(!table.has_permission(Role::Operator, "custom_method"));
    }

    #[test]
    fn add_method_permission_rejects_whitespace_method() {
        let table = PermissionTable::new();
        assert!(table.add_method_permission("   ", Role::Viewer).is_err());
    }

    #[test]
    fn whitespace_method_requires_admin() {
        let table = PermissionTable::new();
        assert_eq!(table.get_required_role("   "), Role::Admin);
    }
}
