//! All-or-nothing edits of a single locked row.
//!
//! A [`UnitOfWork`] holds the row's write lock for its whole lifetime and
//! edits a staged copy. [`UnitOfWork::commit`] swaps the staged copy into
//! the row; any other exit (early return through `?`, a panic, or simply
//! dropping the guard) discards the staged copy and leaves the row exactly
//! as it was.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

/// Scoped write acquisition of one row with rollback unless committed.
#[derive(Debug)]
pub struct UnitOfWork<T> {
    guard: OwnedRwLockWriteGuard<T>,
    staged: T,
    committed: bool,
    label: &'static str,
}

impl<T: Clone> UnitOfWork<T> {
    /// Acquires the row's write lock and stages a copy of its value.
    pub async fn begin(row: Arc<RwLock<T>>, label: &'static str) -> Self {
        let guard = row.write_owned().await;
        let staged = (*guard).clone();
        Self {
            guard,
            staged,
            committed: false,
            label,
        }
    }

    /// Returns the row's value as it was when the unit began.
    #[must_use]
    pub fn original(&self) -> &T {
        &self.guard
    }

    /// Publishes the staged value to the row and releases the lock.
    pub fn commit(mut self) {
        std::mem::swap(&mut *self.guard, &mut self.staged);
        self.committed = true;
    }
}

impl<T> Deref for UnitOfWork<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.staged
    }
}

impl<T> DerefMut for UnitOfWork<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.staged
    }
}

impl<T> Drop for UnitOfWork<T> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::debug!(unit = self.label, "unit of work rolled back");
        }
    }
}
