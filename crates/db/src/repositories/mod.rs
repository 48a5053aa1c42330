//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` (or a transaction) as the first argument. Step
//! persistence is atomic: status transition and result column move in
//! one guarded UPDATE, inside a transaction when child tables are
//! touched.

pub mod healing_event_repo;
pub mod integration_repo;
pub mod test_outcome_repo;
pub mod transformation_repo;

pub use healing_event_repo::HealingEventRepo;
pub use integration_repo::IntegrationRepo;
pub use test_outcome_repo::TestOutcomeRepo;
pub use transformation_repo::TransformationRepo;
