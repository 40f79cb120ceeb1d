use std::{
    cell::{Cell, Ref, RefCell},
    cmp::Ordering,
    fmt::{self, Debug},
    mem::{replace, take},
    ops::RangeBounds,
    rc::{Rc, Weak},
};

use derive_ex::Ex;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    utils::{to_range, IndexNewToOld},
    ChangeBatch, ChangeError, ListChange, ListChangeBuilder, ListenerKey, ListenerList,
    Observable, Subscription,
};


/// A list that notifies listeners of what changed.
///
/// Every mutating method is one batch of its own unless it is called inside an
/// outer batch (see [`Observable::batch`]), in which case all edits of the outer
/// batch are reported in a single [`ListChange`].
///
/// Listeners are called synchronously once the outermost batch ends. They may
/// mutate the list; doing so produces a separate notification, and makes the
/// [`ListChange`] they are holding stale.
#[derive(Ex)]
#[derive_ex(Clone(bound()), Default)]
#[default(Self::new())]
pub struct ObservableVec<T: 'static>(Rc<RawObservableVec<T>>);

struct RawObservableVec<T: 'static> {
    items: RefCell<Vec<T>>,
    builder: RefCell<ListChangeBuilder<T>>,
    listeners: RefCell<ListenerList<ListChange<T>>>,
    version: Cell<u64>,
}

impl<T: 'static> ObservableVec<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_vec(Vec::with_capacity(capacity))
    }
    fn from_vec(items: Vec<T>) -> Self {
        Self(Rc::new(RawObservableVec {
            items: RefCell::new(items),
            builder: RefCell::new(ListChangeBuilder::new()),
            listeners: RefCell::new(ListenerList::new()),
            version: Cell::new(0),
        }))
    }

    /// Creates a list holding the elements of `lists`, one after another.
    pub fn concat(lists: &[ObservableVec<T>]) -> Self
    where
        T: Clone,
    {
        lists.iter().flat_map(|list| list.to_vec()).collect()
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
    /// Borrows the elements.
    ///
    /// The list cannot be mutated while the returned reference is alive.
    pub fn items(&self) -> Ref<'_, [T]> {
        Ref::map(self.0.items.borrow(), |items| items.as_slice())
    }
    pub fn get(&self, index: usize) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.0.items.borrow(), |items| items.get(index)).ok()
    }
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.0.items.borrow().clone()
    }

    /// Runs `f` inside a batch of its own.
    ///
    /// If `f` panics, the batch is left without notifying and the edits recorded so
    /// far are reported by the next batch that commits.
    fn edit<R>(&self, f: impl FnOnce(&mut Vec<T>, &mut ListChangeBuilder<T>) -> R) -> R {
        struct EditGuard<'a, T: 'static>(&'a ObservableVec<T>);
        impl<T: 'static> Drop for EditGuard<'_, T> {
            fn drop(&mut self) {
                let raw = &self.0 .0;
                raw.version.set(raw.version.get().wrapping_add(1));
                let mut builder = raw.builder.borrow_mut();
                if std::thread::panicking() {
                    builder.leave();
                    return;
                }
                let changes = builder.close();
                drop(builder);
                if let Some(changes) = changes {
                    self.0.fire(changes);
                }
            }
        }

        self.0.builder.borrow_mut().begin_change();
        let _guard = EditGuard(self);
        let mut items = self.0.items.borrow_mut();
        let mut builder = self.0.builder.borrow_mut();
        f(&mut items, &mut builder)
    }
    fn fire(&self, changes: ChangeBatch<T>) {
        let dispatch = self.0.listeners.borrow_mut().snapshot();
        if dispatch.is_empty() {
            return;
        }
        let mut change = ListChange::new(self.clone(), changes, self.version());
        dispatch.fire(&mut change);
    }

    pub fn push(&self, value: T) {
        self.edit(|items, b| {
            items.push(value);
            b.add(items.len() - 1, items.len());
        })
    }
    pub fn insert(&self, index: usize, value: T) -> Result<(), ChangeError> {
        ChangeError::check_insert_index(index, self.len())?;
        self.edit(|items, b| {
            items.insert(index, value);
            b.add(index, index + 1);
        });
        Ok(())
    }
    pub fn insert_all(
        &self,
        index: usize,
        values: impl IntoIterator<Item = T>,
    ) -> Result<(), ChangeError> {
        ChangeError::check_insert_index(index, self.len())?;
        let values: Vec<T> = values.into_iter().collect();
        self.edit(|items, b| {
            let count = values.len();
            items.splice(index..index, values);
            b.add(index, index + count);
        });
        Ok(())
    }
    /// Appends `values`.
    ///
    /// The iterator must not access this list.
    pub fn extend(&self, values: impl IntoIterator<Item = T>) {
        self.edit(|items, b| {
            for value in values {
                items.push(value);
                b.add(items.len() - 1, items.len());
            }
        })
    }

    pub fn remove(&self, index: usize) -> Result<T, ChangeError>
    where
        T: Clone,
    {
        ChangeError::check_index(index, self.len())?;
        Ok(self.edit(|items, b| {
            let value = items.remove(index);
            b.remove(index, value.clone());
            value
        }))
    }
    pub fn pop(&self) -> Option<T>
    where
        T: Clone,
    {
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.remove(len - 1).ok()
    }
    /// Replaces the element at `index`, returning the previous one.
    pub fn set(&self, index: usize, value: T) -> Result<T, ChangeError>
    where
        T: Clone,
    {
        ChangeError::check_index(index, self.len())?;
        Ok(self.edit(|items, b| {
            let old = replace(&mut items[index], value);
            b.remove(index, old.clone());
            b.add(index, index + 1);
            old
        }))
    }
    pub fn remove_range(&self, range: impl RangeBounds<usize>) -> Result<(), ChangeError> {
        let range = to_range(range, self.len())?;
        if range.is_empty() {
            return Ok(());
        }
        self.edit(|items, b| {
            let start = range.start;
            let removed: Vec<T> = items.drain(range).collect();
            b.remove_all(start, removed);
        });
        Ok(())
    }
    pub fn truncate(&self, len: usize) {
        if len >= self.len() {
            return;
        }
        self.edit(|items, b| {
            let removed = items.split_off(len);
            b.remove_all(len, removed);
        })
    }
    pub fn clear(&self) {
        if self.is_empty() {
            return;
        }
        self.edit(|items, b| {
            let removed = take(items);
            b.remove_all(0, removed);
        })
    }
    /// Keeps only the elements for which `f` returns `true`.
    ///
    /// `f` must not access this list.
    pub fn retain(&self, mut f: impl FnMut(&T) -> bool)
    where
        T: Clone,
    {
        self.edit(|items, b| {
            let mut index = 0;
            items.retain(|value| {
                let keep = f(value);
                if keep {
                    index += 1;
                } else {
                    b.remove(index, value.clone());
                }
                keep
            })
        })
    }
    /// Removes every element equal to one of `values`.
    pub fn remove_all(&self, values: &[T])
    where
        T: PartialEq + Clone,
    {
        self.retain(|x| !values.contains(x))
    }
    /// Removes every element not equal to one of `values`.
    pub fn retain_all(&self, values: &[T])
    where
        T: PartialEq + Clone,
    {
        self.retain(|x| values.contains(x))
    }

    /// Replaces the whole content, reported as one replacement.
    pub fn set_all(&self, values: impl IntoIterator<Item = T>) {
        let values: Vec<T> = values.into_iter().collect();
        self.edit(|items, b| {
            let removed = replace(items, values);
            b.remove_all(0, removed);
            b.add(0, items.len());
        })
    }
    /// Replaces every element with `value`.
    pub fn fill(&self, value: T)
    where
        T: Clone,
    {
        let len = self.len();
        self.set_all(vec![value; len])
    }
    /// Replaces every element equal to `old` with `new`. Returns `true` if any was replaced.
    pub fn replace_all(&self, old: &T, new: T) -> bool
    where
        T: PartialEq + Clone,
    {
        let values: Vec<T> = {
            let items = self.0.items.borrow();
            if !items.contains(old) {
                return false;
            }
            items
                .iter()
                .map(|x| if x == old { new.clone() } else { x.clone() })
                .collect()
        };
        self.set_all(values);
        true
    }
    /// Overwrites the first `src.len()` elements with `src`.
    pub fn copy_from(&self, src: &[T]) -> Result<(), ChangeError>
    where
        T: Clone,
    {
        let values: Vec<T> = {
            let items = self.0.items.borrow();
            if src.len() > items.len() {
                return Err(ChangeError::IncompatibleSize {
                    src: src.len(),
                    dest: items.len(),
                });
            }
            src.iter().chain(&items[src.len()..]).cloned().collect()
        };
        self.set_all(values);
        Ok(())
    }

    /// Mutates the element at `index` in place and reports it as updated.
    ///
    /// `f` must not access this list.
    pub fn update(&self, index: usize, f: impl FnOnce(&mut T)) -> Result<(), ChangeError>
    where
        T: Clone,
    {
        ChangeError::check_index(index, self.len())?;
        self.edit(|items, b| {
            b.update(index, items[index].clone());
            f(&mut items[index]);
        });
        Ok(())
    }
    /// Mutates the elements in `range` in place and reports them as updated.
    ///
    /// `f` must not access this list.
    pub fn update_range(
        &self,
        range: impl RangeBounds<usize>,
        mut f: impl FnMut(&mut T),
    ) -> Result<(), ChangeError>
    where
        T: Clone,
    {
        let range = to_range(range, self.len())?;
        self.edit(|items, b| {
            for index in range {
                b.update(index, items[index].clone());
                f(&mut items[index]);
            }
        });
        Ok(())
    }

    /// Reorders `from..from + new_to_old.len()`; offsets in `new_to_old` are relative to `from`.
    fn reorder(&self, from: usize, new_to_old: &[usize]) {
        let new_to_old = IndexNewToOld::new(new_to_old);
        if new_to_old.is_identity() {
            return;
        }
        let to = from + new_to_old.as_slice().len();
        let perm: Vec<usize> = new_to_old
            .build_old_to_new()
            .into_iter()
            .map(|new| new + from)
            .collect();
        self.edit(|items, b| {
            new_to_old.apply_to(&mut items[from..to]);
            b.permutate(from, to, &perm);
        })
    }
    pub fn swap(&self, a: usize, b: usize) -> Result<(), ChangeError> {
        let len = self.len();
        ChangeError::check_index(a, len)?;
        ChangeError::check_index(b, len)?;
        let (lo, hi) = (a.min(b), a.max(b));
        let new_to_old: Vec<usize> = (lo..=hi)
            .map(|i| match i {
                i if i == lo => hi - lo,
                i if i == hi => 0,
                i => i - lo,
            })
            .collect();
        self.reorder(lo, &new_to_old);
        Ok(())
    }
    /// Moves the element at `old_index` to `new_index`, shifting the elements in between.
    pub fn move_item(&self, old_index: usize, new_index: usize) -> Result<(), ChangeError> {
        let len = self.len();
        ChangeError::check_index(old_index, len)?;
        ChangeError::check_index(new_index, len)?;
        match old_index.cmp(&new_index) {
            Ordering::Less => {
                let count = new_index - old_index;
                let new_to_old: Vec<usize> = (1..=count).chain([0]).collect();
                self.reorder(old_index, &new_to_old);
            }
            Ordering::Greater => {
                let count = old_index - new_index;
                let new_to_old: Vec<usize> = [count].into_iter().chain(0..count).collect();
                self.reorder(new_index, &new_to_old);
            }
            Ordering::Equal => {}
        }
        Ok(())
    }
    pub fn reverse(&self) {
        let new_to_old: Vec<usize> = (0..self.len()).rev().collect();
        self.reorder(0, &new_to_old)
    }
    /// Rotates the list so that the element at `i` ends up at `(i + distance) mod len`.
    pub fn rotate(&self, distance: isize) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let d = distance.rem_euclid(len as isize) as usize;
        let new_to_old: Vec<usize> = (0..len).map(|new| (new + len - d) % len).collect();
        self.reorder(0, &new_to_old)
    }
    pub fn shuffle<R: Rng + ?Sized>(&self, rng: &mut R) {
        let mut new_to_old: Vec<usize> = (0..self.len()).collect();
        new_to_old.shuffle(rng);
        self.reorder(0, &new_to_old)
    }

    pub fn sort(&self)
    where
        T: Ord,
    {
        self.sort_by(|a, b| a.cmp(b))
    }
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) {
        self.sort_as(compare, true)
    }
    pub fn sort_by_key<K: Ord>(&self, mut key: impl FnMut(&T) -> K) {
        self.sort_by(|a, b| key(a).cmp(&key(b)))
    }
    pub fn sort_unstable(&self)
    where
        T: Ord,
    {
        self.sort_unstable_by(|a, b| a.cmp(b))
    }
    pub fn sort_unstable_by(&self, compare: impl FnMut(&T, &T) -> Ordering) {
        self.sort_as(compare, false)
    }
    pub fn sort_unstable_by_key<K: Ord>(&self, mut key: impl FnMut(&T) -> K) {
        self.sort_unstable_by(|a, b| key(a).cmp(&key(b)))
    }
    fn sort_as(&self, mut compare: impl FnMut(&T, &T) -> Ordering, stable: bool) {
        let new_to_old = {
            let items = self.0.items.borrow();
            let mut new_to_old: Vec<usize> = (0..items.len()).collect();
            let compare = |&i0: &usize, &i1: &usize| compare(&items[i0], &items[i1]);
            if stable {
                new_to_old.sort_by(compare);
            } else {
                new_to_old.sort_unstable_by(compare);
            }
            new_to_old
        };
        self.reorder(0, &new_to_old)
    }

    /// Registers a listener called with the changes of every committed batch.
    pub fn add_listener(&self, f: impl Fn(&mut ListChange<T>) + 'static) -> ListenerKey {
        self.0.listeners.borrow_mut().add_change(Rc::new(f))
    }
    /// Registers a listener that is unregistered once `f` is dropped elsewhere.
    pub fn add_weak_listener<F: Fn(&mut ListChange<T>) + 'static>(&self, f: &Rc<F>) -> ListenerKey {
        let f: Weak<F> = Rc::downgrade(f);
        self.0.listeners.borrow_mut().add_weak_change(f)
    }
    /// Registers a listener that stays registered while the returned [`Subscription`] is alive.
    pub fn subscribe(&self, f: impl Fn(&mut ListChange<T>) + 'static) -> Subscription {
        let key = self.add_listener(f);
        Subscription::from_weak_fn(Rc::downgrade(&self.0), move |this| {
            this.listeners.borrow_mut().remove(key);
        })
    }
    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }
}

impl<T: 'static> Observable for ObservableVec<T> {
    fn begin_change(&self) {
        self.0.builder.borrow_mut().begin_change();
    }
    fn end_change(&self) -> Result<(), ChangeError> {
        let changes = self.0.builder.borrow_mut().end_change()?;
        if let Some(changes) = changes {
            self.fire(changes);
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

impl<T> From<Vec<T>> for ObservableVec<T> {
    fn from(value: Vec<T>) -> Self {
        Self::from_vec(value)
    }
}
impl<T> FromIterator<T> for ObservableVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}
impl<T: Debug> Debug for ObservableVec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.items.try_borrow() {
            Ok(items) => f.debug_list().entries(items.iter()).finish(),
            Err(_) => write!(f, "<borrowed>"),
        }
    }
}
impl<T: Serialize> Serialize for ObservableVec<T> {
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
impl<'de, T: Deserialize<'de> + 'static> Deserialize<'de> for ObservableVec<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Vec::<T>::deserialize(deserializer).map(Self::from_vec)
    }
}
