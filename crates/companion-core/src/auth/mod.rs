//! Authentication session management.
//!
//! `Session` reads and writes the persisted `userInfo` bundle. It is read
//! on every authenticated request so that a token refreshed by one request
//! is seen by the next.

pub mod session;

pub use session::Session;
