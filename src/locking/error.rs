//! Lock Error Types

use thiserror::Error;

use crate::core_types::AccountId;

/// Failures raised by the lock registry and coordinator.
///
/// Both variants must reach the lifecycle coordinator; nothing in the
/// locking layer swallows them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Acquisition gave up, either because every attempt timed out or
    /// because the wait was cancelled (`interrupted == true`).
    #[error(
        "Failed to acquire lock for resource {resource_id} after {attempts} attempts ({total_wait_ms} ms, interrupted: {interrupted})"
    )]
    Acquisition {
        resource_id: AccountId,
        attempts: u32,
        total_wait_ms: u64,
        interrupted: bool,
    },

    /// The caller tried to release a lock it does not hold.
    #[error("Cannot release lock that is not held for resource {resource_id}")]
    Release { resource_id: AccountId },
}

impl LockError {
    pub fn resource_id(&self) -> AccountId {
        match self {
            LockError::Acquisition { resource_id, .. } | LockError::Release { resource_id } => {
                *resource_id
            }
        }
    }

    /// Acquisition aborted by cancellation rather than contention
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            LockError::Acquisition {
                interrupted: true,
                ..
            }
        )
    }

    pub fn code(&self) -> &'static str {
        match self {
            LockError::Acquisition {
                interrupted: true, ..
            } => "LOCK_INTERRUPTED",
            LockError::Acquisition { .. } => "LOCK_ACQUISITION_FAILED",
            LockError::Release { .. } => "LOCK_RELEASE_FAILED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let timeout = LockError::Acquisition {
            resource_id: 7,
            attempts: 5,
            total_wait_ms: 1200,
            interrupted: false,
        };
        let interrupted = LockError::Acquisition {
            resource_id: 7,
            attempts: 1,
            total_wait_ms: 3,
            interrupted: true,
        };
        let release = LockError::Release { resource_id: 9 };

        assert_eq!(timeout.code(), "LOCK_ACQUISITION_FAILED");
        assert_eq!(interrupted.code(), "LOCK_INTERRUPTED");
        assert_eq!(release.code(), "LOCK_RELEASE_FAILED");

        assert!(!timeout.is_interrupted());
        assert!(interrupted.is_interrupted());
        assert_eq!(release.resource_id(), 9);
    }

    #[test]
    fn test_display() {
        let err = LockError::Release { resource_id: 3 };
        assert_eq!(
            err.to_string(),
            "Cannot release lock that is not held for resource 3"
        );
    }
}
