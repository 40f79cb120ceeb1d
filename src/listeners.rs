use std::rc::{Rc, Weak};

use derive_ex::derive_ex;
use smallvec::SmallVec;


/// Identifies a registration in a [`ListenerList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerKey(u64);

/// A notification object that can be rewound before it is handed to the next listener.
pub trait Notification {
    fn reset(&mut self);
}

/// A registration that may outlive the listener it refers to.
pub trait WeakListener {
    /// Returns `true` once the listener has been dropped.
    fn is_stale(&self) -> bool;
}

enum Callback<E> {
    Invalidation(Rc<dyn Fn()>),
    Change(Rc<dyn Fn(&mut E)>),
    WeakInvalidation(Weak<dyn Fn()>),
    WeakChange(Weak<dyn Fn(&mut E)>),
}
impl<E> Callback<E> {
    fn upgrade(&self) -> Option<Target<E>> {
        match self {
            Callback::Invalidation(f) => Some(Target::Invalidation(f.clone())),
            Callback::Change(f) => Some(Target::Change(f.clone())),
            Callback::WeakInvalidation(f) => f.upgrade().map(Target::Invalidation),
            Callback::WeakChange(f) => f.upgrade().map(Target::Change),
        }
    }
}
impl<E> WeakListener for Callback<E> {
    fn is_stale(&self) -> bool {
        match self {
            Callback::Invalidation(_) | Callback::Change(_) => false,
            Callback::WeakInvalidation(f) => f.strong_count() == 0,
            Callback::WeakChange(f) => f.strong_count() == 0,
        }
    }
}

struct Entry<E> {
    key: ListenerKey,
    callback: Callback<E>,
}

/// Listeners of one collection, in registration order.
///
/// Invalidation listeners and change listeners share the same table so that
/// they are invoked in the order they were registered.
#[derive_ex(Default)]
#[default(Self::new())]
pub struct ListenerList<E> {
    entries: SmallVec<[Entry<E>; 2]>,
    next_key: u64,
}

impl<E> ListenerList<E> {
    pub fn new() -> Self {
        Self {
            entries: SmallVec::new(),
            next_key: 0,
        }
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, callback: Callback<E>) -> ListenerKey {
        let key = ListenerKey(self.next_key);
        self.next_key += 1;
        self.entries.push(Entry { key, callback });
        key
    }
    pub fn add_invalidation(&mut self, f: Rc<dyn Fn()>) -> ListenerKey {
        self.push(Callback::Invalidation(f))
    }
    pub fn add_change(&mut self, f: Rc<dyn Fn(&mut E)>) -> ListenerKey {
        self.push(Callback::Change(f))
    }
    pub fn add_weak_invalidation(&mut self, f: Weak<dyn Fn()>) -> ListenerKey {
        self.push(Callback::WeakInvalidation(f))
    }
    pub fn add_weak_change(&mut self, f: Weak<dyn Fn(&mut E)>) -> ListenerKey {
        self.push(Callback::WeakChange(f))
    }

    /// Unregisters the listener. Returns `false` if it was not registered.
    pub fn remove(&mut self, key: ListenerKey) -> bool {
        if let Some(index) = self.entries.iter().position(|e| e.key == key) {
            self.entries.remove(index);
            true
        } else {
            false
        }
    }

    /// Drops stale weak registrations and captures the live listeners.
    ///
    /// The returned snapshot does not borrow the list, so listeners may register
    /// or unregister listeners, or mutate the collection, while it is fired.
    pub fn snapshot(&mut self) -> Dispatch<E> {
        let len = self.entries.len();
        self.entries.retain(|e| !e.callback.is_stale());
        if self.entries.len() != len {
            tracing::debug!(pruned = len - self.entries.len(), "pruned stale listeners");
        }
        Dispatch(
            self.entries
                .iter()
                .filter_map(|e| e.callback.upgrade())
                .collect(),
        )
    }
}

enum Target<E> {
    Invalidation(Rc<dyn Fn()>),
    Change(Rc<dyn Fn(&mut E)>),
}

/// Listeners captured for one notification.
pub struct Dispatch<E>(SmallVec<[Target<E>; 2]>);

impl<E: Notification> Dispatch<E> {
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Invokes every listener once, rewinding `event` before each change listener.
    pub fn fire(&self, event: &mut E) {
        tracing::trace!(listeners = self.0.len(), "fire change");
        for target in &self.0 {
            match target {
                Target::Invalidation(f) => f(),
                Target::Change(f) => {
                    event.reset();
                    f(event)
                }
            }
        }
    }
}
