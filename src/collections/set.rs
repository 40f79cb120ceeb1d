use std::{
    cell::{Ref, RefCell},
    collections::HashSet,
    fmt::{self, Debug},
    hash::Hash,
    mem::take,
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use serde::{Deserialize, Serialize};

use crate::{
    ChangeError, KeyedChangeBuilder, KeyedEntry, ListenerKey, ListenerList, Observable, SetChange,
    Subscription,
};


/// A hash set that notifies listeners of the elements added and removed.
#[derive(Ex)]
#[derive_ex(Clone(bound()), Default)]
#[default(Self::new())]
pub struct ObservableSet<T: Clone + Eq + Hash + 'static>(Rc<RawObservableSet<T>>);

struct RawObservableSet<T: Clone + Eq + Hash + 'static> {
    items: RefCell<HashSet<T>>,
    builder: RefCell<KeyedChangeBuilder<T, ()>>,
    listeners: RefCell<ListenerList<SetChange<T>>>,
}

impl<T: Clone + Eq + Hash + 'static> ObservableSet<T> {
    pub fn new() -> Self {
        Self::from_set(HashSet::new())
    }
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_set(HashSet::with_capacity(capacity))
    }
    fn from_set(items: HashSet<T>) -> Self {
        Self(Rc::new(RawObservableSet {
            items: RefCell::new(items),
            builder: RefCell::new(KeyedChangeBuilder::new()),
            listeners: RefCell::new(ListenerList::new()),
        }))
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn contains(&self, value: &T) -> bool {
        self.0.items.borrow().contains(value)
    }
    /// Borrows the elements.
    pub fn items(&self) -> Ref<'_, HashSet<T>> {
        self.0.items.borrow()
    }

    fn edit<R>(&self, f: impl FnOnce(&mut HashSet<T>, &mut KeyedChangeBuilder<T, ()>) -> R) -> R {
        struct EditGuard<'a, T: Clone + Eq + Hash + 'static>(&'a ObservableSet<T>);
        impl<T: Clone + Eq + Hash + 'static> Drop for EditGuard<'_, T> {
            fn drop(&mut self) {
                let mut builder = self.0 .0.builder.borrow_mut();
                if std::thread::panicking() {
                    builder.leave();
                    return;
                }
                let entries = builder.close();
                drop(builder);
                if let Some(entries) = entries {
                    self.0.fire(entries);
                }
            }
        }

        self.0.builder.borrow_mut().begin_change();
        let _guard = EditGuard(self);
        let mut items = self.0.items.borrow_mut();
        let mut builder = self.0.builder.borrow_mut();
        f(&mut items, &mut builder)
    }
    fn fire(&self, entries: Vec<KeyedEntry<T, ()>>) {
        let dispatch = self.0.listeners.borrow_mut().snapshot();
        if dispatch.is_empty() {
            return;
        }
        let mut change = SetChange::new(self.clone(), entries);
        dispatch.fire(&mut change);
    }

    /// Adds `value`. Returns `false` if it was already present.
    pub fn insert(&self, value: T) -> bool {
        if self.contains(&value) {
            return false;
        }
        self.edit(|items, b| {
            b.add(value.clone());
            items.insert(value)
        })
    }
    /// Removes `value`. Returns `false` if it was not present.
    pub fn remove(&self, value: &T) -> bool {
        if !self.contains(value) {
            return false;
        }
        self.edit(|items, b| {
            let Some(value) = items.take(value) else {
                return false;
            };
            b.remove(value, ());
            true
        })
    }
    pub fn clear(&self) {
        if self.is_empty() {
            return;
        }
        self.edit(|items, b| {
            for value in take(items) {
                b.remove(value, ());
            }
        })
    }
    /// Inserts `values`.
    ///
    /// The iterator must not access this set.
    pub fn extend(&self, values: impl IntoIterator<Item = T>) {
        self.edit(|items, b| {
            for value in values {
                if !items.contains(&value) {
                    b.add(value.clone());
                    items.insert(value);
                }
            }
        })
    }
    /// Keeps only the elements for which `f` returns `true`.
    ///
    /// `f` must not access this set.
    pub fn retain(&self, mut f: impl FnMut(&T) -> bool) {
        self.edit(|items, b| {
            items.retain(|value| {
                let keep = f(value);
                if !keep {
                    b.remove(value.clone(), ());
                }
                keep
            })
        })
    }
    pub fn remove_all(&self, values: &[T]) {
        self.retain(|x| !values.contains(x))
    }
    pub fn retain_all(&self, values: &[T]) {
        self.retain(|x| values.contains(x))
    }

    pub fn add_listener(&self, f: impl Fn(&mut SetChange<T>) + 'static) -> ListenerKey {
        self.0.listeners.borrow_mut().add_change(Rc::new(f))
    }
    pub fn add_weak_listener<F: Fn(&mut SetChange<T>) + 'static>(&self, f: &Rc<F>) -> ListenerKey {
        let f: Weak<F> = Rc::downgrade(f);
        self.0.listeners.borrow_mut().add_weak_change(f)
    }
    pub fn subscribe(&self, f: impl Fn(&mut SetChange<T>) + 'static) -> Subscription {
        let key = self.add_listener(f);
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |this| {
            this.listeners.borrow_mut().remove(key);
        })
    }
    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }
}

impl<T: Clone + Eq + Hash + 'static> Observable for ObservableSet<T> {
    fn begin_change(&self) {
        self.0.builder.borrow_mut().begin_change();
    }
    fn end_change(&self) -> Result<(), ChangeError> {
        let entries = self.0.builder.borrow_mut().end_change()?;
        if let Some(entries) = entries {
            self.fire(entries);
        }
        Ok(())
    }
    fn add_invalidation_listener(&self, f: impl Fn() + 'static) -> ListenerKey {
        self.0.listeners.borrow_mut().add_invalidation(Rc::new(f))
    }
    fn add_weak_invalidation_listener<F: Fn() + 'static>(&self, f: &Rc<F>) -> ListenerKey {
        let f: Weak<F> = Rc::downgrade(f);
        self.0.listeners.borrow_mut().add_weak_invalidation(f)
    }
    fn remove_listener(&self, key: ListenerKey) -> bool {
        self.0.listeners.borrow_mut().remove(key)
    }
}

impl<T: Clone + Eq + Hash + 'static> FromIterator<T> for ObservableSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_set(iter.into_iter().collect())
    }
}
impl<T: Clone + Eq + Hash + 'static> From<HashSet<T>> for ObservableSet<T> {
    fn from(value: HashSet<T>) -> Self {
        Self::from_set(value)
    }
}
impl<T: Clone + Eq + Hash + Debug + 'static> Debug for ObservableSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.items.try_borrow() {
            Ok(items) => f.debug_set().entries(items.iter()).finish(),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<T: Clone + Eq + Hash + Serialize + 'static> Serialize for ObservableSet<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.0.items.try_borrow() {
            Ok(items) => serializer.collect_seq(items.iter()),
            Err(_) => Err(serde::ser::Error::custom("borrowed")),
        }
    }
}
impl<'de, T: Clone + Eq + Hash + Deserialize<'de> + 'static> Deserialize<'de>
    for ObservableSet<T>
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        HashSet::<T>::deserialize(deserializer).map(Self::from_set)
    }
}
