//! Optional collaborator seams: access checking and persistence.
//!
//! Both are injected at construction and invoked only when present, instead
//! of run-time "is this configured" probing inside the pipeline. Neither is
//! implemented here beyond what tests and single-process deployments need;
//! real RBAC engines and databases live behind these traits.

use std::sync::Mutex;

use crate::error::PersistError;

// =============================================================================
// Access Checking
// =============================================================================

/// The two operations a checker can gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Crop,
}

/// Access-control seam, consulted before either operation when configured.
///
/// A `false` answer surfaces as HTTP 403 and never reaches the staging or
/// commit logic.
pub trait AccessChecker: Send + Sync {
    fn can_access(&self, operation: Operation, session_id: &str) -> bool;
}

/// Checker driven by a plain closure. Convenient for tests and simple
/// deployments.
pub struct FnAccessChecker<F>(pub F);

impl<F> AccessChecker for FnAccessChecker<F>
where
    F: Fn(Operation, &str) -> bool + Send + Sync,
{
    fn can_access(&self, operation: Operation, session_id: &str) -> bool {
        (self.0)(operation, session_id)
    }
}

// =============================================================================
// Persistence
// =============================================================================

/// Persistence seam for recording the committed image in a durable record
/// (e.g. an avatar column).
///
/// `current_value` reports what is stored now, so the committer can delete a
/// previously committed file under the overwrite-previous policy. A failing
/// `save` is reported as a warning and never flips a success response.
pub trait PersistenceSink: Send + Sync {
    fn current_value(&self) -> Option<String>;

    fn save(&self, value: &str) -> Result<(), PersistError>;
}

/// In-memory sink holding a single value. Used in tests and as a reference
/// implementation.
#[derive(Debug, Default)]
pub struct InMemorySink {
    value: Mutex<Option<String>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl PersistenceSink for InMemorySink {
    fn current_value(&self) -> Option<String> {
        self.value.lock().unwrap().clone()
    }

    fn save(&self, value: &str) -> Result<(), PersistError> {
        *self.value.lock().unwrap() = Some(value.to_string());
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
