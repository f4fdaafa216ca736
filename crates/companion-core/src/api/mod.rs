//! REST API client module for the companion backend.
//!
//! This module provides the `ApiClient` for authenticated calls against the
//! companion server: account and session endpoints (register, login, logout,
//! delete account, verify, refresh) and the saved-locations endpoints.
//!
//! Requests carry the stored access token as a bearer token. A 401 either
//! logs the user out or, with token refresh enabled, triggers one silent
//! refresh and a single retry.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthPolicy, LogoutHook};
pub use error::ApiError;
