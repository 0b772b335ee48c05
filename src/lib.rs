//! ZIGMA — prediction-market intelligence chat skill
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod api;
pub mod cache;
pub mod commands;
pub mod community;
pub mod config;
pub mod entitlement;
pub mod format;
pub mod heartbeat;
pub mod host;
pub mod store;
pub mod types;
pub mod validate;
