use std::{
    cell::Ref,
    fmt::{self, Debug},
    hash::Hash,
    slice,
};

use crate::{ChangeError, Notification, ObservableMap, ObservableSet, ObservableVec};


/// One consolidated edit of a list.
///
/// `from..to` is expressed in the index space left behind by every sub-change
/// that precedes this one in the same notification.
#[derive(Clone, PartialEq, Eq)]
pub struct SubChange<T> {
    pub(crate) from: usize,
    pub(crate) to: usize,
    pub(crate) removed: Vec<T>,
    pub(crate) perm: Vec<usize>,
    pub(crate) updated: bool,
}

impl<T> SubChange<T> {
    pub(crate) fn add_remove(from: usize, to: usize, removed: Vec<T>) -> Self {
        Self {
            from,
            to,
            removed,
            perm: Vec::new(),
            updated: false,
        }
    }
    /// An update that still carries the values its elements had before the batch.
    pub(crate) fn pending_update(from: usize, originals: Vec<T>) -> Self {
        Self {
            from,
            to: from + originals.len(),
            removed: originals,
            perm: Vec::new(),
            updated: true,
        }
    }
    #[cfg(test)]
    pub(crate) fn update(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            removed: Vec::new(),
            perm: Vec::new(),
            updated: true,
        }
    }
    pub(crate) fn permute(from: usize, perm: Vec<usize>) -> Self {
        Self {
            from,
            to: from + perm.len(),
            removed: Vec::new(),
            perm,
            updated: false,
        }
    }
    pub(crate) fn shift(&mut self, delta: isize) {
        self.from = self.from.wrapping_add_signed(delta);
        self.to = self.to.wrapping_add_signed(delta);
    }

    pub fn from(&self) -> usize {
        self.from
    }
    pub fn to(&self) -> usize {
        self.to
    }
    /// Elements that were at `from` before this sub-change.
    pub fn removed(&self) -> &[T] {
        &self.removed
    }
    pub fn removed_size(&self) -> usize {
        self.removed.len()
    }
    pub fn added_size(&self) -> usize {
        if self.was_added() {
            self.to - self.from
        } else {
            0
        }
    }
    /// New indices of the elements that were at `from..to`, or an empty slice.
    pub fn permutation(&self) -> &[usize] {
        &self.perm
    }
    pub fn was_permutated(&self) -> bool {
        !self.perm.is_empty()
    }
    pub fn was_updated(&self) -> bool {
        self.updated
    }
    pub fn was_added(&self) -> bool {
        !self.was_permutated() && !self.updated && self.from < self.to
    }
    pub fn was_removed(&self) -> bool {
        !self.removed.is_empty()
    }
    pub fn was_replaced(&self) -> bool {
        self.was_added() && self.was_removed()
    }

    /// New index of the element that was at `index`.
    ///
    /// Indices outside the permuted range are returned unchanged.
    pub fn permutation_of(&self, index: usize) -> usize {
        if self.from <= index && index < self.to && self.was_permutated() {
            self.perm[index - self.from]
        } else {
            index
        }
    }
}
impl<T: Debug> Debug for SubChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.was_permutated() {
            write!(f, "Permutated({}..{}, {:?})", self.from, self.to, self.perm)
        } else if self.updated {
            write!(f, "Updated({}..{})", self.from, self.to)
        } else {
            write!(
                f,
                "AddRemove({}..{}, removed: {:?})",
                self.from, self.to, self.removed
            )
        }
    }
}

/// The sub-changes committed by one outermost batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeBatch<T> {
    Single(SubChange<T>),
    Many(Vec<SubChange<T>>),
}

impl<T> ChangeBatch<T> {
    pub fn as_slice(&self) -> &[SubChange<T>] {
        match self {
            ChangeBatch::Single(c) => slice::from_ref(c),
            ChangeBatch::Many(cs) => cs,
        }
    }
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Forward-only position over a fixed number of entries.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Cursor {
    position: Option<usize>,
    len: usize,
}
impl Cursor {
    pub fn new(len: usize) -> Self {
        Self {
            position: None,
            len,
        }
    }
    pub fn next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p.saturating_add(1).min(self.len));
        self.position = Some(next);
        next < self.len
    }
    pub fn reset(&mut self) {
        self.position = None;
    }
    pub fn current(&self) -> Result<usize, ChangeError> {
        match self.position {
            Some(p) if p < self.len => Ok(p),
            _ => Err(ChangeError::NoCurrentChange),
        }
    }
}

/// Notification delivered to list listeners.
///
/// Sub-changes are visited with [`next`](Self::next) in the order
/// permutation, additions/removals, updates. Every accessor fails with
/// [`ChangeError::NoCurrentChange`] unless the cursor is on a sub-change.
pub struct ListChange<T: 'static> {
    list: ObservableVec<T>,
    changes: ChangeBatch<T>,
    cursor: Cursor,
    version: u64,
}

impl<T: 'static> ListChange<T> {
    pub(crate) fn new(list: ObservableVec<T>, changes: ChangeBatch<T>, version: u64) -> Self {
        let cursor = Cursor::new(changes.len());
        Self {
            list,
            changes,
            cursor,
            version,
        }
    }

    /// The list that fired this notification.
    pub fn list(&self) -> &ObservableVec<T> {
        &self.list
    }
    pub fn next(&mut self) -> bool {
        self.cursor.next()
    }
    pub fn reset(&mut self) {
        self.cursor.reset()
    }
    pub fn current(&self) -> Result<&SubChange<T>, ChangeError> {
        Ok(&self.changes.as_slice()[self.cursor.current()?])
    }
    /// All sub-changes of this notification, regardless of the cursor.
    pub fn entries(&self) -> &[SubChange<T>] {
        self.changes.as_slice()
    }

    pub fn from(&self) -> Result<usize, ChangeError> {
        Ok(self.current()?.from())
    }
    pub fn to(&self) -> Result<usize, ChangeError> {
        Ok(self.current()?.to())
    }
    pub fn removed(&self) -> Result<&[T], ChangeError> {
        Ok(self.current()?.removed())
    }
    pub fn removed_size(&self) -> Result<usize, ChangeError> {
        Ok(self.current()?.removed_size())
    }
    pub fn added_size(&self) -> Result<usize, ChangeError> {
        Ok(self.current()?.added_size())
    }
    pub fn was_added(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_added())
    }
    pub fn was_removed(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_removed())
    }
    pub fn was_replaced(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_replaced())
    }
    pub fn was_updated(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_updated())
    }
    pub fn was_permutated(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_permutated())
    }
    pub fn permutation_of(&self, index: usize) -> Result<usize, ChangeError> {
        Ok(self.current()?.permutation_of(index))
    }

    /// The elements added by the current sub-change, read from the live list.
    ///
    /// Fails with [`ChangeError::Stale`] once the list has been modified after this
    /// notification was produced.
    pub fn added_subrange(&self) -> Result<Ref<'_, [T]>, ChangeError> {
        let c = self.current()?;
        if self.list.version() != self.version {
            return Err(ChangeError::Stale);
        }
        let range = if c.was_added() { c.from..c.to } else { 0..0 };
        Ok(Ref::map(self.list.items(), |items| &items[range]))
    }
}
impl<T: 'static> Notification for ListChange<T> {
    fn reset(&mut self) {
        self.cursor.reset()
    }
}
impl<T: Debug + 'static> Debug for ListChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries()).finish()
    }
}

/// One pending or committed entry of a keyed collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyedEntry<K, V> {
    pub(crate) key: K,
    pub(crate) removed: Option<V>,
    pub(crate) added: bool,
}
impl<K, V> KeyedEntry<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }
    pub fn removed(&self) -> Option<&V> {
        self.removed.as_ref()
    }
    pub fn was_added(&self) -> bool {
        self.added
    }
    pub fn was_removed(&self) -> bool {
        self.removed.is_some()
    }
    pub fn was_replaced(&self) -> bool {
        self.was_added() && self.was_removed()
    }
}

/// Notification delivered to set listeners. Entry order is unspecified.
pub struct SetChange<T: Clone + Eq + Hash + 'static> {
    set: ObservableSet<T>,
    entries: Vec<KeyedEntry<T, ()>>,
    cursor: Cursor,
}
impl<T: Clone + Eq + Hash + 'static> SetChange<T> {
    pub(crate) fn new(set: ObservableSet<T>, entries: Vec<KeyedEntry<T, ()>>) -> Self {
        let cursor = Cursor::new(entries.len());
        Self {
            set,
            entries,
            cursor,
        }
    }
    pub fn set(&self) -> &ObservableSet<T> {
        &self.set
    }
    pub fn next(&mut self) -> bool {
        self.cursor.next()
    }
    pub fn reset(&mut self) {
        self.cursor.reset()
    }
    pub fn entries(&self) -> &[KeyedEntry<T, ()>] {
        &self.entries
    }
    fn current(&self) -> Result<&KeyedEntry<T, ()>, ChangeError> {
        Ok(&self.entries[self.cursor.current()?])
    }
    pub fn element(&self) -> Result<&T, ChangeError> {
        Ok(self.current()?.key())
    }
    pub fn was_added(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_added())
    }
    pub fn was_removed(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_removed())
    }
}
impl<T: Clone + Eq + Hash + 'static> Notification for SetChange<T> {
    fn reset(&mut self) {
        self.cursor.reset()
    }
}
impl<T: Clone + Eq + Hash + Debug + 'static> Debug for SetChange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}

/// Notification delivered to map listeners. Entry order is unspecified.
pub struct MapChange<K: Clone + Eq + Hash + 'static, V: 'static> {
    map: ObservableMap<K, V>,
    entries: Vec<KeyedEntry<K, V>>,
    cursor: Cursor,
    version: u64,
}
impl<K: Clone + Eq + Hash + 'static, V: 'static> MapChange<K, V> {
    pub(crate) fn new(
        map: ObservableMap<K, V>,
        entries: Vec<KeyedEntry<K, V>>,
        version: u64,
    ) -> Self {
        let cursor = Cursor::new(entries.len());
        Self {
            map,
            entries,
            cursor,
            version,
        }
    }
    pub fn map(&self) -> &ObservableMap<K, V> {
        &self.map
    }
    pub fn next(&mut self) -> bool {
        self.cursor.next()
    }
    pub fn reset(&mut self) {
        self.cursor.reset()
    }
    pub fn entries(&self) -> &[KeyedEntry<K, V>] {
        &self.entries
    }
    fn current(&self) -> Result<&KeyedEntry<K, V>, ChangeError> {
        Ok(&self.entries[self.cursor.current()?])
    }
    pub fn key(&self) -> Result<&K, ChangeError> {
        Ok(self.current()?.key())
    }
    pub fn value_removed(&self) -> Result<Option<&V>, ChangeError> {
        Ok(self.current()?.removed())
    }
    /// The value now stored under the current key, read from the live map.
    pub fn value_added(&self) -> Result<Option<Ref<'_, V>>, ChangeError> {
        let entry = self.current()?;
        if !entry.was_added() {
            return Ok(None);
        }
        if self.map.version() != self.version {
            return Err(ChangeError::Stale);
        }
        Ok(self.map.get(entry.key()))
    }
    pub fn was_added(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_added())
    }
    pub fn was_removed(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_removed())
    }
    pub fn was_replaced(&self) -> Result<bool, ChangeError> {
        Ok(self.current()?.was_replaced())
    }
}
impl<K: Clone + Eq + Hash + 'static, V: 'static> Notification for MapChange<K, V> {
    fn reset(&mut self) {
        self.cursor.reset()
    }
}
impl<K: Clone + Eq + Hash + Debug + 'static, V: Debug + 'static> Debug for MapChange<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.entries).finish()
    }
}
