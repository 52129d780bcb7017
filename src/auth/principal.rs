// src/auth/principal.rs

use serde::{Deserialize, Serialize};

pub const UNKNOWN_DISPLAY_NAME: &str = "Unknown";

/// The authenticated caller, fixed for the lifetime of one request/session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: i64,
    pub org_id: i64,
    pub name: String,
    pub email: String,
}

impl Principal {
    pub fn new(user_id: i64, org_id: i64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id,
            org_id,
            name: name.into(),
            email: email.into(),
        }
    }
}
