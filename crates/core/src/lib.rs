//! Pure domain logic for the integration lifecycle platform.
//!
//! Everything in this crate is I/O-free: the normalized specification
//! model, the field mapper, the synthetic payload generator, health
//! scoring, drift detection, healing diagnosis, and the lifecycle
//! state machine. Network and database concerns live in the sibling
//! crates.

pub mod drift;
pub mod error;
pub mod healing;
pub mod mapping;
pub mod outcome;
pub mod payload;
pub mod scoring;
pub mod spec;
pub mod status;
pub mod types;
