//! Per-integration advisory locks.
//!
//! While one step for a given integration is in flight, a second step
//! request for the same id is rejected rather than interleaved. Healing
//! invocations go through the same lock, so a monitor-triggered heal
//! and a user-initiated step are mutually exclusive too.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use weave_core::error::CoreError;
use weave_core::status::StepKind;
use weave_core::types::DbId;

/// Registry of per-integration step locks.
#[derive(Default)]
pub struct StepLocks {
    inner: Mutex<HashMap<DbId, Arc<tokio::sync::Mutex<()>>>>,
}

impl StepLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock for an integration.
    ///
    /// Fails with a `Precondition` error naming the attempted step if
    /// another step for the same integration holds the lock. Dropping
    /// the returned guard releases it.
    pub fn try_acquire(
        &self,
        id: DbId,
        step: StepKind,
    ) -> Result<OwnedMutexGuard<()>, CoreError> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(id).or_default())
        };

        lock.try_lock_owned().map_err(|_| {
            CoreError::Precondition(format!(
                "another step is already in flight for integration {id}; \
                 '{}' was rejected",
                step.as_str()
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn second_acquire_on_same_id_rejected() {
        let locks = StepLocks::new();
        let guard = locks.try_acquire(1, StepKind::Deploy).unwrap();

        let second = locks.try_acquire(1, StepKind::Deploy);
        assert_matches!(second, Err(CoreError::Precondition(_)));

        drop(guard);
        assert!(locks.try_acquire(1, StepKind::Deploy).is_ok());
    }

    #[test]
    fn different_ids_are_independent() {
        let locks = StepLocks::new();
        let _a = locks.try_acquire(1, StepKind::Test).unwrap();
        assert!(locks.try_acquire(2, StepKind::Test).is_ok());
    }

    #[test]
    fn healing_and_steps_share_the_lock() {
        let locks = StepLocks::new();
        let _step = locks.try_acquire(7, StepKind::Test).unwrap();
        assert_matches!(
            locks.try_acquire(7, StepKind::Heal),
            Err(CoreError::Precondition(_))
        );
    }
}
