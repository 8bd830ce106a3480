//! Session state: the per-session temp slot and per-session locking.
//!
//! The slot is the crux of the staging lifecycle: it binds a session id to at
//! most one staged file name. The upload path sets it, the commit path
//! consumes it, and both run under the session's lock so delete-then-write
//! sequences never race.

mod locks;
mod slot;

pub use locks::SessionLocks;
pub use slot::{InMemorySlotStore, SlotStore};
