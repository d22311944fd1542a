//! Networking modules for the portal REST API.
//!
//! SYSTEM CONTEXT
//! ==============
//! `api` executes every backend call, `error` normalizes failed responses,
//! and `types` defines the wire schema shared with the backend.

pub mod api;
pub mod error;
pub mod types;
