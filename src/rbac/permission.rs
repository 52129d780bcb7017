// src/rbac/permission.rs
// Registered permission keys

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::RbacError;

/// A `resource:action` key, lowercased at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionKey(String);

impl PermissionKey {
    pub fn new(resource: &str, action: &str) -> Self {
        Self(format!("{}:{}", resource, action).to_lowercase())
    }

    /// Accepts an already joined key such as `"Resources:Read"`.
    pub fn parse(raw: &str) -> Result<Self, RbacError> {
        match raw.trim().split_once(':') {
            Some((resource, action))
                if !resource.is_empty() && !action.is_empty() && !action.contains(':') =>
            {
                Ok(Self::new(resource, action))
            }
            _ => Err(RbacError::InvalidKey(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every permission the application checks. Role grants stay data-driven;
/// this only pins down which keys code may ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    UsersRead,
    UsersWrite,
    UsersAssignRole,
    RolesRead,
    RolesWrite,
    ResourcesRead,
    ResourcesWrite,
    ResourcesGenerateToken,
    ResourcesConnect,
    AuditRead,
}

impl Permission {
    pub const ALL: [Permission; 10] = [
        Permission::UsersRead,
        Permission::UsersWrite,
        Permission::UsersAssignRole,
        Permission::RolesRead,
        Permission::RolesWrite,
        Permission::ResourcesRead,
        Permission::ResourcesWrite,
        Permission::ResourcesGenerateToken,
        Permission::ResourcesConnect,
        Permission::AuditRead,
    ];

    fn parts(self) -> (&'static str, &'static str) {
        match self {
            Permission::UsersRead => ("users", "read"),
            Permission::UsersWrite => ("users", "write"),
            Permission::UsersAssignRole => ("users", "assign-role"),
            Permission::RolesRead => ("roles", "read"),
            Permission::RolesWrite => ("roles", "write"),
            Permission::ResourcesRead => ("resources", "read"),
            Permission::ResourcesWrite => ("resources", "write"),
            Permission::ResourcesGenerateToken => ("resources", "generate-token"),
            Permission::ResourcesConnect => ("resources", "connect"),
            Permission::AuditRead => ("audit", "read"),
        }
    }

    pub fn key(self) -> PermissionKey {
        let (resource, action) = self.parts();
        PermissionKey::new(resource, action)
    }

    pub fn description(self) -> &'static str {
        match self {
            Permission::UsersRead => "View users",
            Permission::UsersWrite => "Manage users",
            Permission::UsersAssignRole => "Assign roles to users",
            Permission::RolesRead => "View roles",
            Permission::RolesWrite => "Manage roles",
            Permission::ResourcesRead => "View resources",
            Permission::ResourcesWrite => "Manage resources",
            Permission::ResourcesGenerateToken => "Generate registration tokens",
            Permission::ResourcesConnect => "Open interactive SSH sessions",
            Permission::AuditRead => "View audit logs",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (resource, action) = self.parts();
        write!(f, "{}:{}", resource, action)
    }
}

impl FromStr for Permission {
    type Err = RbacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = PermissionKey::parse(s)?;
        Permission::ALL
            .into_iter()
            .find(|p| p.key() == key)
            .ok_or_else(|| RbacError::UnknownPermission(key.to_string()))
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
