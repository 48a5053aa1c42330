//! HTTP surface for the integration lifecycle service.
//!
//! Library target so integration tests can build the exact router the
//! binary serves.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
