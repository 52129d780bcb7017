// src/api/http/mod.rs

pub mod audit;
pub mod health;

pub use audit::list_audit_logs;
pub use health::{health_check, liveness_check};
