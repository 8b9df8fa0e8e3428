//! Data Transfer Objects
//!
//! Request bodies, query parameters, and response shapes for the HTTP
//! API.

pub mod request;
pub mod response;
