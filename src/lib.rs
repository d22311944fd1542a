//! Client core for the document portal.
//!
//! SYSTEM CONTEXT
//! ==============
//! `net` is the single HTTP access point to the portal backend, `token` holds
//! the persisted bearer credential, and `state` owns the authentication
//! lifecycle that every consumer (pages, the console) reads from.

pub mod config;
pub mod net;
pub mod state;
pub mod token;

pub use config::PortalConfig;
pub use net::api::ApiClient;
pub use net::error::{ApiError, ErrorCode};
pub use state::auth::{AuthError, AuthState, SessionManager, SessionStatus};
pub use token::{FileTokenStore, MemoryTokenStore, TokenStore, TokenStoreError};
