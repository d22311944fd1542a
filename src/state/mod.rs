//! Client-side state shared by every consumer of the portal core.

pub mod auth;
