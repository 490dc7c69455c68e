//! Session lifecycle, frame routing, and per-session workers.

pub mod manager;
mod worker;

pub use manager::SessionManager;
