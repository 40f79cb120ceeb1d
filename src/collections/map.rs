use std::{
    borrow::Borrow,
    cell::{Cell, Ref, RefCell},
    collections::HashMap,
    fmt::{self, Debug},
    hash::Hash,
    mem::take,
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use serde::{Deserialize, Serialize};

use crate::{
    ChangeError, KeyedChangeBuilder, KeyedEntry, ListenerKey, ListenerList, MapChange, Observable,
    Subscription,
};

#[cfg(test)]
mod tests;

/// A hash map that notifies listeners of the entries added, removed and replaced.
#[derive(Ex)]
#[derive_ex(Clone(bound()), Default)]
#[default(Self::new())]
pub struct ObservableMap<K: Clone + Eq + Hash + 'static, V: 'static>(Rc<RawObservableMap<K, V>>);

struct RawObservableMap<K: Clone + Eq + Hash + 'static, V: 'static> {
    items: RefCell<HashMap<K, V>>,
    builder: RefCell<KeyedChangeBuilder<K, V>>,
    listeners: RefCell<ListenerList<MapChange<K, V>>>,
    version: Cell<u64>,
}

impl<K: Clone + Eq + Hash + 'static, V: 'static> ObservableMap<K, V> {
    pub fn new() -> Self {
        Self::from_map(HashMap::new())
    }
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_map(HashMap::with_capacity(capacity))
    }
    fn from_map(items: HashMap<K, V>) -> Self {
        Self(Rc::new(RawObservableMap {
            items: RefCell::new(items),
            builder: RefCell::new(KeyedChangeBuilder::new()),
            listeners: RefCell::new(ListenerList::new()),
            version: Cell::new(0),
        }))
    }

    pub(crate) fn version(&self) -> u64 {
        self.0.version.get()
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.0.items.borrow().contains_key(key)
    }
    pub fn get<Q>(&self, key: &Q) -> Option<Ref<'_, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Ref::filter_map(self.0.items.borrow(), |items| items.get(key)).ok()
    }
    /// Borrows the entries.
    pub fn items(&self) -> Ref<'_, HashMap<K, V>> {
        self.0.items.borrow()
    }

    fn edit<R>(&self, f: impl FnOnce(&mut HashMap<K, V>, &mut KeyedChangeBuilder<K, V>) -> R) -> R {
        struct EditGuard<'a, K: Clone + Eq + Hash + 'static, V: 'static>(&'a ObservableMap<K, V>);
        impl<K: Clone + Eq + Hash + 'static, V: 'static> Drop for EditGuard<'_, K, V> {
            fn drop(&mut self) {
                let raw = &self.0 .0;
                raw.version.set(raw.version.get().wrapping_add(1));
                let mut builder = raw.builder.borrow_mut();
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
    fn fire(&self, entries: Vec<KeyedEntry<K, V>>) {
        let dispatch = self.0.listeners.borrow_mut().snapshot();
        if dispatch.is_empty() {
            return;
        }
        let mut change = MapChange::new(self.clone(), entries, self.version());
        dispatch.fire(&mut change);
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V>
    where
        V: Clone,
    {
        self.edit(|items, b| {
            let old = items.insert(key.clone(), value);
            if let Some(old) = &old {
                b.remove(key.clone(), old.clone());
            }
            b.add(key);
            old
        })
    }
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        if !self.contains_key(key) {
            return None;
        }
        self.edit(|items, b| {
            let (key, value) = items.remove_entry(key)?;
            b.remove(key, value.clone());
            Some(value)
        })
    }
    pub fn clear(&self) {
        if self.is_empty() {
            return;
        }
        self.edit(|items, b| {
            for (key, value) in take(items) {
                b.remove(key, value);
            }
        })
    }
    /// Inserts `entries`, replacing existing values.
    ///
    /// The iterator must not access this map.
    pub fn extend(&self, entries: impl IntoIterator<Item = (K, V)>)
    where
        V: Clone,
    {
        self.edit(|items, b| {
            for (key, value) in entries {
                if let Some(old) = items.insert(key.clone(), value) {
                    b.remove(key.clone(), old);
                }
                b.add(key);
            }
        })
    }
    /// Keeps only the entries for which `f` returns `true`.
    ///
    /// `f` must not access this map.
    pub fn retain(&self, mut f: impl FnMut(&K, &V) -> bool)
    where
        V: Clone,
    {
        self.edit(|items, b| {
            items.retain(|key, value| {
                let keep = f(key, value);
                if !keep {
                    b.remove(key.clone(), value.clone());
                }
                keep
            })
        })
    }

    pub fn add_listener(&self, f: impl Fn(&mut MapChange<K, V>) + 'static) -> ListenerKey {
        self.0.listeners.borrow_mut().add_change(Rc::new(f))
    }
    pub fn add_weak_listener<F: Fn(&mut MapChange<K, V>) + 'static>(
        &self,
        f: &Rc<F>,
    ) -> ListenerKey {
        let f: Weak<F> = Rc::downgrade(f);
        self.0.listeners.borrow_mut().add_weak_change(f)
    }
    pub fn subscribe(&self, f: impl Fn(&mut MapChange<K, V>) + 'static) -> Subscription {
        let key = self.add_listener(f);
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |this| {
            this.listeners.borrow_mut().remove(key);
        })
    }
    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }
}

impl<K: Clone + Eq + Hash + 'static, V: 'static> Observable for ObservableMap<K, V> {
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

impl<K: Clone + Eq + Hash + 'static, V: 'static> FromIterator<(K, V)> for ObservableMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_map(iter.into_iter().collect())
    }
}
impl<K: Clone + Eq + Hash + 'static, V: 'static> From<HashMap<K, V>> for ObservableMap<K, V> {
    fn from(value: HashMap<K, V>) -> Self {
        Self::from_map(value)
    }
}
impl<K: Clone + Eq + Hash + Debug + 'static, V: Debug + 'static> Debug for ObservableMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.items.try_borrow() {
            Ok(items) => f.debug_map().entries(items.iter()).finish(),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<K, V> Serialize for ObservableMap<K, V>
where
    K: Clone + Eq + Hash + Serialize + 'static,
    V: Serialize + 'static,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self.0.items.try_borrow() {
            Ok(items) => serializer.collect_map(items.iter()),
            Err(_) => Err(serde::ser::Error::custom("borrowed")),
        }
    }
}
impl<'de, K, V> Deserialize<'de> for ObservableMap<K, V>
where
    K: Clone + Eq + Hash + Deserialize<'de> + 'static,
    V: Deserialize<'de> + 'static,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        HashMap::<K, V>::deserialize(deserializer).map(Self::from_map)
    }
}
