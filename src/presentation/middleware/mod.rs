//! Middleware
//!
//! Tower middleware for request processing.

pub mod auth;
pub mod cors;
pub mod logging;

pub use auth::{auth_middleware, require_staff, require_verified, AuthUser, Claims};
pub use logging::{create_trace_layer, security_audit, track_requests};
