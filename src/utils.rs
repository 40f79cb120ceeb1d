use std::{
    mem::transmute,
    ops::{Bound, Range, RangeBounds},
};

use crate::ChangeError;

#[cfg(test)]
pub(crate) mod test_helpers;
#[cfg(test)]
mod tests;

/// A reordering expressed as "the element now at `new` came from `self[new]`".
#[derive(Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct IndexNewToOld([usize]);
impl IndexNewToOld {
    pub fn new(new_to_old: &[usize]) -> &Self {
        // SAFETY: `IndexNewToOld` is a `repr(transparent)` wrapper around `[usize]`.
        unsafe { transmute(new_to_old) }
    }

    pub fn build_old_to_new(&self) -> Vec<usize> {
        let mut old_to_new = vec![usize::MAX; self.0.len()];
        for (new_index, &old_index) in self.0.iter().enumerate() {
            old_to_new[old_index] = new_index;
        }
        old_to_new
    }

    pub fn apply_to<T>(&self, items: &mut [T]) {
        let mut old_to_new = self.build_old_to_new();
        for old in 0..items.len() {
            loop {
                let new = old_to_new[old];
                if old == new {
                    break;
                }
                items.swap(old, new);
                old_to_new.swap(old, new);
            }
        }
    }
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &x)| i == x)
    }
}

/// Checks that `perm` maps `from..to` onto itself one-to-one.
pub(crate) fn is_permutation_of(perm: &[usize], from: usize, to: usize) -> bool {
    if perm.len() != to - from {
        return false;
    }
    let mut seen = vec![false; perm.len()];
    for &p in perm {
        if p < from || p >= to || seen[p - from] {
            return false;
        }
        seen[p - from] = true;
    }
    true
}

pub(crate) fn to_range(
    range: impl RangeBounds<usize>,
    len: usize,
) -> Result<Range<usize>, ChangeError> {
    let start = match range.start_bound() {
        Bound::Included(&n) => n,
        Bound::Excluded(&n) => n + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&n) => n + 1,
        Bound::Excluded(&n) => n,
        Bound::Unbounded => len,
    };
    if start > end {
        return Err(ChangeError::InvalidRange {
            from: start,
            to: end,
        });
    }
    if end > len {
        return Err(ChangeError::OutOfBounds { index: end, len });
    }
    Ok(start..end)
}
