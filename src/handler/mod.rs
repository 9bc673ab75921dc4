//! Request handler module
//!
//! Preflight short-circuit, bearer token check, and dispatch to the four
//! secrets routes.

pub mod auth;
pub mod router;
pub mod secrets;

// Re-export main entry point
pub use router::handle;
