use std::{cell::RefCell, fmt::Debug, rc::Rc};

use crate::{ObservableVec, SubChange, Subscription};

/// Replays `changes` on `old`, taking added and updated elements from `new`.
pub fn apply_changes<T: Clone + PartialEq + Debug>(
    old: &[T],
    new: &[T],
    changes: &[SubChange<T>],
) -> Vec<T> {
    let mut items = old.to_vec();
    for c in changes {
        if c.was_permutated() {
            let moved = items[c.from()..c.to()].to_vec();
            for (i, value) in moved.into_iter().enumerate() {
                items[c.permutation_of(c.from() + i)] = value;
            }
        } else if c.was_updated() {
            items[c.from()..c.to()].clone_from_slice(&new[c.from()..c.to()]);
        } else {
            let removed: Vec<T> = items
                .drain(c.from()..c.from() + c.removed_size())
                .collect();
            assert_eq!(removed, c.removed(), "removed elements of {c:?}");
            let added = &new[c.from()..c.from() + c.added_size()];
            items.splice(c.from()..c.from(), added.iter().cloned());
        }
    }
    items
}

/// Copy of a list kept in sync by replaying its notifications.
pub struct Mirror<T> {
    items: Rc<RefCell<Vec<T>>>,
    _subscription: Subscription,
}
impl<T: Clone + PartialEq + Debug + 'static> Mirror<T> {
    pub fn new(list: &ObservableVec<T>) -> Self {
        let items = Rc::new(RefCell::new(list.to_vec()));
        let mirror = items.clone();
        let subscription = list.subscribe(move |c| {
            let new = c.list().to_vec();
            let mut mirror = mirror.borrow_mut();
            let next = apply_changes(&mirror, &new, c.entries());
            *mirror = next;
        });
        Self {
            items,
            _subscription: subscription,
        }
    }
    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }
}
