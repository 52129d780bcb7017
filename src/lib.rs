// src/lib.rs

pub mod api;
pub mod audit;
pub mod auth;
pub mod bridge;
pub mod config;
pub mod credential;
pub mod db;
pub mod directory;
pub mod rbac;
pub mod ssh;
pub mod state;
