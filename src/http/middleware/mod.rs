//! HTTP middleware.

pub mod active_requests;

pub use active_requests::track_active_requests;
