use std::{cmp::Ordering, mem::take};

use derive_ex::derive_ex;

use crate::{utils::is_permutation_of, ChangeBatch, ChangeError, SubChange};

pub mod keyed;


/// Accumulates the edits of one batch of list mutations.
///
/// Edits are expressed against the current state of the list, i.e. after every
/// edit already recorded in the batch. The builder keeps three sequences:
///
/// - at most one permutation, expressed against the list as it was when the batch began,
/// - additions and removals, sorted by `from`, never overlapping or touching,
/// - updates, sorted by `from`, never overlapping or touching. Until commit, an
///   update also holds the value each of its elements had before its first update,
///   so that a later removal reports the element as it was before the batch.
///
/// When the outermost batch ends, they are committed in that order into a
/// [`ChangeBatch`].
#[derive_ex(Default)]
#[default(Self::new())]
pub struct ListChangeBuilder<T> {
    depth: usize,
    add_remove: Vec<SubChange<T>>,
    updates: Vec<SubChange<T>>,
    permutation: Option<SubChange<T>>,
}

impl<T> ListChangeBuilder<T> {
    pub fn new() -> Self {
        Self {
            depth: 0,
            add_remove: Vec::new(),
            updates: Vec::new(),
            permutation: None,
        }
    }

    /// Number of batches currently open.
    pub fn depth(&self) -> usize {
        self.depth
    }
    pub fn is_in_batch(&self) -> bool {
        self.depth != 0
    }
    /// Returns `true` if no edit is pending.
    pub fn is_empty(&self) -> bool {
        self.add_remove.is_empty() && self.updates.is_empty() && self.permutation.is_none()
    }

    pub fn begin_change(&mut self) {
        self.depth += 1;
        tracing::trace!(depth = self.depth, "begin change");
    }

    /// Closes one batch.
    ///
    /// Returns the committed changes when the outermost batch is closed and at
    /// least one edit was recorded.
    pub fn end_change(&mut self) -> Result<Option<ChangeBatch<T>>, ChangeError> {
        self.check_state()?;
        Ok(self.close())
    }

    pub(crate) fn close(&mut self) -> Option<ChangeBatch<T>> {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
        tracing::trace!(depth = self.depth, "end change");
        if self.depth == 0 {
            self.commit()
        } else {
            None
        }
    }

    /// Closes one batch without committing.
    ///
    /// Pending edits are reported by the next outermost batch that commits.
    pub(crate) fn leave(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
        tracing::debug!(
            depth = self.depth,
            pending = !self.is_empty(),
            "left change without commit"
        );
    }

    fn commit(&mut self) -> Option<ChangeBatch<T>> {
        let mut changes = Vec::with_capacity(
            self.permutation.is_some() as usize + self.add_remove.len() + self.updates.len(),
        );
        changes.extend(self.permutation.take());
        changes.append(&mut self.add_remove);
        changes.extend(self.updates.drain(..).map(|mut c| {
            c.removed.clear();
            c
        }));
        tracing::trace!(sub_changes = changes.len(), "commit change");
        match changes.len() {
            0 => None,
            1 => changes.pop().map(ChangeBatch::Single),
            _ => Some(ChangeBatch::Many(changes)),
        }
    }

    fn check_state(&self) -> Result<(), ChangeError> {
        if self.depth == 0 {
            tracing::debug!("edit recorded outside of a batch");
            Err(ChangeError::NotInBatch)
        } else {
            Ok(())
        }
    }

    /// Records that `from..to` were inserted.
    pub fn next_add(&mut self, from: usize, to: usize) -> Result<(), ChangeError> {
        self.check_state()?;
        if from > to {
            return Err(ChangeError::InvalidRange { from, to });
        }
        self.add(from, to);
        Ok(())
    }

    /// Records that `removed` was removed from `index`.
    pub fn next_remove(&mut self, index: usize, removed: T) -> Result<(), ChangeError> {
        self.check_state()?;
        self.remove(index, removed);
        Ok(())
    }

    /// Records that consecutive elements were removed starting at `index`.
    pub fn next_remove_all(
        &mut self,
        index: usize,
        removed: impl IntoIterator<Item = T>,
    ) -> Result<(), ChangeError> {
        self.check_state()?;
        self.remove_all(index, removed);
        Ok(())
    }

    /// Records that the element at `index` was replaced; `old` is the previous element.
    pub fn next_set(&mut self, index: usize, old: T) -> Result<(), ChangeError> {
        self.check_state()?;
        self.remove(index, old);
        self.add(index, index + 1);
        Ok(())
    }

    /// Records that `removed` were replaced by the elements now at `from..to`.
    pub fn next_replace(
        &mut self,
        from: usize,
        to: usize,
        removed: impl IntoIterator<Item = T>,
    ) -> Result<(), ChangeError> {
        self.check_state()?;
        if from > to {
            return Err(ChangeError::InvalidRange { from, to });
        }
        self.remove_all(from, removed);
        self.add(from, to);
        Ok(())
    }

    /// Records that the element at `index` changed in place; `old` is its value before the change.
    pub fn next_update(&mut self, index: usize, old: T) -> Result<(), ChangeError> {
        self.check_state()?;
        self.update(index, old);
        Ok(())
    }

    /// Records that the elements at `from..to` were reordered.
    ///
    /// `perm[i]` is the new index of the element that was at `from + i`.
    pub fn next_permutation(
        &mut self,
        from: usize,
        to: usize,
        perm: &[usize],
    ) -> Result<(), ChangeError> {
        self.check_state()?;
        if from > to {
            return Err(ChangeError::InvalidRange { from, to });
        }
        if !is_permutation_of(perm, from, to) {
            tracing::debug!(from, to, "rejected permutation");
            return Err(ChangeError::InvalidPermutation);
        }
        self.permutate(from, to, perm);
        Ok(())
    }

    pub(crate) fn add(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let count = to - from;
        let next = match find_sub_change(from, &self.add_remove) {
            Ok(i) => {
                self.add_remove[i].to += count;
                i + 1
            }
            Err(i) => {
                if i > 0 && self.add_remove[i - 1].to == from {
                    self.add_remove[i - 1].to = to;
                    i
                } else {
                    self.add_remove.insert(i, SubChange::add_remove(from, to, Vec::new()));
                    i + 1
                }
            }
        };
        shift(&mut self.add_remove[next..], count as isize);

        let next = match find_sub_change(from, &self.updates) {
            Ok(i) if self.updates[i].from < from => {
                let c = &mut self.updates[i];
                let originals = c.removed.split_off(from - c.from);
                let tail = SubChange::pending_update(to, originals);
                c.to = from;
                self.updates.insert(i + 1, tail);
                i + 2
            }
            Ok(i) | Err(i) => i,
        };
        shift(&mut self.updates[next..], count as isize);
    }

    pub(crate) fn remove(&mut self, index: usize, removed: T) {
        let removed = self.remove_update(index).unwrap_or(removed);
        let next = match find_sub_change(index, &self.add_remove) {
            Ok(i) => {
                // The element was added in this batch, so it vanishes without a trace.
                let c = &mut self.add_remove[i];
                c.to -= 1;
                if c.from == c.to && c.removed.is_empty() {
                    self.add_remove.remove(i);
                    i
                } else {
                    i + 1
                }
            }
            Err(i) => {
                let touches_prev = i > 0 && self.add_remove[i - 1].to == index;
                let touches_next =
                    i < self.add_remove.len() && self.add_remove[i].from == index + 1;
                match (touches_prev, touches_next) {
                    (true, true) => {
                        let next = self.add_remove.remove(i);
                        let prev = &mut self.add_remove[i - 1];
                        prev.removed.push(removed);
                        prev.removed.extend(next.removed);
                        prev.to += next.to - next.from;
                        i
                    }
                    (true, false) => {
                        self.add_remove[i - 1].removed.push(removed);
                        i
                    }
                    (false, true) => {
                        let c = &mut self.add_remove[i];
                        c.shift(-1);
                        c.removed.insert(0, removed);
                        i + 1
                    }
                    (false, false) => {
                        self.add_remove
                            .insert(i, SubChange::add_remove(index, index, vec![removed]));
                        i + 1
                    }
                }
            }
        };
        shift(&mut self.add_remove[next..], -1);
    }

    /// Drops `index` from the updates, returning its value from before its first update.
    fn remove_update(&mut self, index: usize) -> Option<T> {
        let (original, next) = match find_sub_change(index, &self.updates) {
            Ok(i) => {
                let c = &mut self.updates[i];
                let original = c.removed.remove(index - c.from);
                if c.to - c.from == 1 {
                    self.updates.remove(i);
                    (Some(original), i)
                } else {
                    c.to -= 1;
                    (Some(original), i + 1)
                }
            }
            Err(i) => (None, i),
        };
        shift(&mut self.updates[next..], -1);
        if next > 0
            && next < self.updates.len()
            && self.updates[next - 1].to == self.updates[next].from
        {
            let c = self.updates.remove(next);
            let prev = &mut self.updates[next - 1];
            prev.to = c.to;
            prev.removed.extend(c.removed);
        }
        original
    }

    pub(crate) fn remove_all(&mut self, index: usize, removed: impl IntoIterator<Item = T>) {
        for value in removed {
            self.remove(index, value);
        }
    }

    pub(crate) fn update(&mut self, index: usize, old: T) {
        let Err(i) = find_sub_change(index, &self.updates) else {
            return;
        };
        let touches_prev = i > 0 && self.updates[i - 1].to == index;
        let touches_next = i < self.updates.len() && self.updates[i].from == index + 1;
        match (touches_prev, touches_next) {
            (true, true) => {
                let next = self.updates.remove(i);
                let prev = &mut self.updates[i - 1];
                prev.to = next.to;
                prev.removed.push(old);
                prev.removed.extend(next.removed);
            }
            (true, false) => {
                let prev = &mut self.updates[i - 1];
                prev.to = index + 1;
                prev.removed.push(old);
            }
            (false, true) => {
                let next = &mut self.updates[i];
                next.from = index;
                next.removed.insert(0, old);
            }
            (false, false) => self.updates.insert(i, SubChange::pending_update(index, vec![old])),
        }
    }

    /// Folds a reordering of `from..to` into the ledger.
    ///
    /// The pending state is expanded into "where did each current element come
    /// from", the reordering is applied to that map, and the three sequences are
    /// rebuilt from the result. Removed elements keep their original slots, so the
    /// rebuilt permutation only moves elements that survive the batch.
    pub(crate) fn permutate(&mut self, from: usize, to: usize, perm: &[usize]) {
        if perm.iter().enumerate().all(|(i, &p)| p == from + i) {
            return;
        }
        let delta: isize = self
            .add_remove
            .iter()
            .map(|c| (c.to - c.from) as isize - c.removed.len() as isize)
            .sum();

        // Past `end` (current indices) and `end_original` nothing has changed.
        let mut end = to;
        if let Some(c) = self.add_remove.last() {
            end = end.max(c.to);
        }
        if let Some(c) = self.updates.last() {
            end = end.max(c.to);
        }
        let mut end_original = end.wrapping_add_signed(-delta);
        if let Some(p) = &self.permutation {
            if p.to > end_original {
                end_original = p.to;
                end = end_original.wrapping_add_signed(delta);
            }
        }

        let mut slot_to_original: Vec<usize> = (0..end_original).collect();
        if let Some(p) = self.permutation.take() {
            for (i, &new) in p.perm.iter().enumerate() {
                slot_to_original[new] = p.from + i;
            }
        }

        // `origin[i]` is the original index of the element now at `i`, or `None` if it was added.
        let mut origin: Vec<Option<usize>> = Vec::with_capacity(end);
        let mut removed: Vec<Option<T>> = (0..end_original).map(|_| None).collect();
        let mut slot = 0;
        for c in take(&mut self.add_remove) {
            while origin.len() < c.from {
                origin.push(Some(slot_to_original[slot]));
                slot += 1;
            }
            for value in c.removed {
                removed[slot_to_original[slot]] = Some(value);
                slot += 1;
            }
            origin.resize(c.to, None);
        }
        while origin.len() < end {
            origin.push(Some(slot_to_original[slot]));
            slot += 1;
        }

        // `updated[i]` is the value the element now at `i` had before its first update.
        let mut updated: Vec<Option<T>> = (0..end).map(|_| None).collect();
        for c in take(&mut self.updates) {
            for (i, value) in c.removed.into_iter().enumerate() {
                updated[c.from + i] = Some(value);
            }
        }

        let moved_origin = origin[from..to].to_vec();
        let moved_updated: Vec<Option<T>> =
            updated[from..to].iter_mut().map(Option::take).collect();
        for ((&p, o), u) in perm.iter().zip(moved_origin).zip(moved_updated) {
            origin[p] = o;
            updated[p] = u;
        }

        // Surviving elements take the original slots of the survivors, in their new order.
        let mut slots: Vec<usize> = origin.iter().flatten().copied().collect();
        slots.sort_unstable();
        let mut original_to_new: Vec<usize> = (0..end_original).collect();
        for (&o, &s) in origin.iter().flatten().zip(&slots) {
            original_to_new[o] = s;
        }
        let first = original_to_new.iter().enumerate().position(|(o, &n)| o != n);
        let last = original_to_new.iter().enumerate().rposition(|(o, &n)| o != n);
        if let (Some(first), Some(last)) = (first, last) {
            self.permutation = Some(SubChange::permute(
                first,
                original_to_new[first..=last].to_vec(),
            ));
        }

        let mut slot = 0;
        let mut index = 0;
        let mut slots = slots.into_iter();
        for (i, o) in origin.iter().enumerate() {
            if o.is_none() {
                continue;
            }
            let Some(s) = slots.next() else {
                break;
            };
            if slot < s || index < i {
                let values = removed[slot..s].iter_mut().filter_map(Option::take).collect();
                self.add_remove.push(SubChange::add_remove(index, i, values));
            }
            slot = s + 1;
            index = i + 1;
        }
        if slot < end_original || index < end {
            let values = removed[slot..].iter_mut().filter_map(Option::take).collect();
            self.add_remove.push(SubChange::add_remove(index, end, values));
        }

        let mut updated = updated.into_iter().enumerate().peekable();
        while let Some((start, value)) = updated.next() {
            let Some(value) = value else {
                continue;
            };
            let mut originals = vec![value];
            while let Some((_, Some(_))) = updated.peek() {
                if let Some((_, Some(value))) = updated.next() {
                    originals.push(value);
                }
            }
            self.updates.push(SubChange::pending_update(start, originals));
        }
    }
}

/// Finds the sub-change whose `from..to` contains `index`.
///
/// Returns `Err` with the insertion position when none does.
fn find_sub_change<T>(index: usize, changes: &[SubChange<T>]) -> Result<usize, usize> {
    changes.binary_search_by(|c| {
        if index >= c.to {
            Ordering::Less
        } else if index < c.from {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

fn shift<T>(changes: &mut [SubChange<T>], delta: isize) {
    for c in changes {
        c.shift(delta);
    }
}
