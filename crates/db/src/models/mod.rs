//! Row structs and DTOs, one module per table.

pub mod healing_event;
pub mod integration;
pub mod test_outcome;
pub mod transformation;
