// src/api/ws/mod.rs

pub mod terminal;

pub use terminal::ws_ssh_handler;
