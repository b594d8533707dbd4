//! Single-writer, multi-reader cells with wholesale replacement.
//!
//! A reader takes an `Arc` snapshot and keeps using it even if the writer
//! publishes a newer value meanwhile; published values are never mutated.

use arc_swap::ArcSwapOption;
use std::sync::Arc;

pub struct SnapshotCell<T> {
    inner: ArcSwapOption<T>,
}

impl<T> SnapshotCell<T> {
    pub fn empty() -> Self {
        Self { inner: ArcSwapOption::const_empty() }
    }

    pub fn new(value: T) -> Self {
        Self { inner: ArcSwapOption::from_pointee(value) }
    }

    /// Replace the current value.
    pub fn publish(&self, value: T) {
        self.inner.store(Some(Arc::new(value)));
    }

    pub fn publish_arc(&self, value: Arc<T>) {
        self.inner.store(Some(value));
    }

    /// Current value, if anything has been published.
    pub fn snapshot(&self) -> Option<Arc<T>> {
        self.inner.load_full()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().is_none()
    }
}

impl<T> Default for SnapshotCell<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> std::fmt::Debug for SnapshotCell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCell")
            .field("published", &!self.is_empty())
            .finish()
    }
}
