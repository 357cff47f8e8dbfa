//! Correlation-id generation.
//!
//! Ids are unique per generator for the lifetime of a connection, not
//! globally. Every component that mints ids (a client connection, the
//! server's notification path) receives its own generator explicitly; there
//! is no process-wide shared instance.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Monotonic id source returning incrementing integers starting at 1.
///
/// Cloning yields a handle to the same underlying counter, so a generator
/// can be shared between the tasks of one connection without ids colliding.
#[derive(Clone, Debug)]
pub struct IdGenerator {
    current: Arc<AtomicI32>,
}

impl IdGenerator {
    /// Create a generator whose first id is 1.
    pub fn new() -> Self {
        Self {
            current: Arc::new(AtomicI32::new(1)),
        }
    }

    /// Return the next id.
    pub fn next_id(&self) -> i32 {
        self.current.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
