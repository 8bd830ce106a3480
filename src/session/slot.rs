//! The session temp slot: a single-valued binding `session id -> file name`.
//!
//! # Contract
//!
//! - `set` overwrites any existing binding; the caller deletes the
//!   previously-bound file first if one existed.
//! - `clear` is idempotent; clearing a non-existent binding is not an error.
//! - At most one staged file name is bound per session at any time.
//! - A binding is consumed exactly once per successful commit: the commit
//!   path clears it and no later operation reads it without an intervening
//!   `set`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

// =============================================================================
// Slot Store Trait
// =============================================================================

/// Storage backend for session temp slots.
///
/// The trait is async so that implementations backed by an external session
/// store (Redis, a database) fit the same seam as the in-memory default.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Bind the session to a staged file name, overwriting any prior binding.
    async fn set(&self, session_id: &str, file_name: &str);

    /// Get the currently bound file name, if any.
    async fn get(&self, session_id: &str) -> Option<String>;

    /// Remove the binding. Idempotent.
    async fn clear(&self, session_id: &str);
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// In-memory slot store backed by a mutex-guarded map.
///
/// Suitable for single-process deployments and tests. The mutex is held only
/// for the map operation itself, never across an await point.
#[derive(Debug, Default)]
pub struct InMemorySlotStore {
    slots: Mutex<HashMap<String, String>>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with a bound slot. Test/diagnostic helper.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn set(&self, session_id: &str, file_name: &str) {
        self.slots
            .lock()
            .unwrap()
            .insert(session_id.to_string(), file_name.to_string());
    }

    async fn get(&self, session_id: &str) -> Option<String> {
        self.slots.lock().unwrap().get(session_id).cloned()
    }

    async fn clear(&self, session_id: &str) {
        self.slots.lock().unwrap().remove(session_id);
    }
}

// =============================================================================
// Tests
// =============================================================================
