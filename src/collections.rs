use std::rc::Rc;

use crate::{ChangeError, ListenerKey};

pub mod map;
pub mod set;
pub mod vec;

/// Batching and invalidation API shared by every observable collection.
pub trait Observable {
    /// Opens a batch. Edits made until the matching [`end_change`](Self::end_change)
    /// are reported in a single notification.
    fn begin_change(&self);

    /// Closes a batch, notifying listeners if it was the outermost one.
    fn end_change(&self) -> Result<(), ChangeError>;

    /// Opens a batch that is closed when the returned guard is dropped.
    fn batch(&self) -> Batch<'_, Self>
    where
        Self: Sized,
    {
        self.begin_change();
        Batch(self)
    }

    /// Registers a listener called once for every committed batch.
    fn add_invalidation_listener(&self, f: impl Fn() + 'static) -> ListenerKey
    where
        Self: Sized;

    /// Registers a listener that is dropped from the table once `f` is dropped elsewhere.
    fn add_weak_invalidation_listener<F: Fn() + 'static>(&self, f: &Rc<F>) -> ListenerKey
    where
        Self: Sized;

    /// Unregisters a listener. Returns `false` if it was not registered.
    fn remove_listener(&self, key: ListenerKey) -> bool;
}

/// Guard returned by [`Observable::batch`].
#[must_use]
pub struct Batch<'a, O: Observable>(&'a O);

impl<O: Observable> Drop for Batch<'_, O> {
    fn drop(&mut self) {
        if let Err(e) = self.0.end_change() {
            tracing::warn!(error = %e, "batch was already closed");
        }
    }
}
