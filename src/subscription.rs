use std::{
    any::Any,
    mem::take,
    rc::{Rc, Weak},
};


/// Keeps a listener registered until dropped.
#[derive(Default)]
#[must_use]
pub struct Subscription(RawSubscription);

impl Subscription {
    pub fn empty() -> Self {
        Subscription(RawSubscription::Empty)
    }
    pub fn from_fn(f: impl FnOnce() + 'static) -> Self {
        Subscription(RawSubscription::Fn(Box::new(f)))
    }

    /// Calls `unsubscribe` on drop if `owner` is still alive.
    pub fn from_weak_fn<T: 'static>(
        owner: Weak<T>,
        unsubscribe: impl Fn(Rc<T>) + 'static,
    ) -> Self {
        Subscription(RawSubscription::WeakFn {
            owner,
            unsubscribe: Box::new(move |owner| {
                if let Some(owner) = owner.upgrade() {
                    if let Ok(owner) = owner.downcast() {
                        unsubscribe(owner)
                    }
                }
            }),
        })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.0, RawSubscription::Empty)
    }

    /// Leaves the listener registered for the lifetime of the collection.
    pub fn detach(mut self) {
        self.0 = RawSubscription::Empty;
    }
}
impl Drop for Subscription {
    fn drop(&mut self) {
        match take(&mut self.0) {
            RawSubscription::Empty => {}
            RawSubscription::Fn(f) => f(),
            RawSubscription::WeakFn { owner, unsubscribe } => unsubscribe(owner),
        }
    }
}

#[derive(Default)]
enum RawSubscription {
    #[default]
    Empty,
    Fn(Box<dyn FnOnce() + 'static>),
    WeakFn {
        owner: Weak<dyn Any>,
        unsubscribe: Box<dyn Fn(Weak<dyn Any>)>,
    },
}
