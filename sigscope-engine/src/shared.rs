//! Prepare-time publication slot.
//!
//! Per-channel state that consumer handles read (probe banks, peak levels) is
//! rebuilt on every prepare event and swapped in whole. The audio thread keeps
//! its own `Arc` clone and never touches the lock; only prepare (writer) and
//! consumer queries (readers) do.

use std::sync::Arc;

use parking_lot::RwLock;

#[derive(Debug)]
pub struct SharedSlot<T> {
    inner: Arc<RwLock<Arc<T>>>,
}

impl<T> Clone for SharedSlot<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T> SharedSlot<T> {
    pub fn new(value: Arc<T>) -> Self {
        Self { inner: Arc::new(RwLock::new(value)) }
    }

    /// Current value.
    #[inline]
    pub fn load(&self) -> Arc<T> {
        Arc::clone(&self.inner.read())
    }

    /// Replace the value; readers holding the old `Arc` keep it alive.
    #[inline]
    pub fn store(&self, value: Arc<T>) {
        *self.inner.write() = value;
    }
}
