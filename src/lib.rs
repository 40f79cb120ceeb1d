//! Observable collections that report what changed, one consolidated
//! notification per batch of mutations.
//!
//! ```
//! use std::{cell::RefCell, rc::Rc};
//! use observable_collections::{Observable, ObservableVec};
//!
//! let list = ObservableVec::from(vec![1, 2, 3]);
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let l = log.clone();
//! let _s = list.subscribe(move |c| {
//!     while c.next() {
//!         l.borrow_mut().push((c.from().unwrap(), c.to().unwrap()));
//!     }
//! });
//! {
//!     let _b = list.batch();
//!     list.push(4);
//!     list.push(5);
//! }
//! assert_eq!(*log.borrow(), vec![(3, 5)]);
//! ```
mod builder;
mod change;
mod collections;
mod error;
mod listeners;
mod subscription;
mod utils;

pub use builder::{keyed::KeyedChangeBuilder, ListChangeBuilder};
pub use change::*;
pub use collections::{
    map::ObservableMap, set::ObservableSet, vec::ObservableVec, Batch, Observable,
};
pub use error::ChangeError;
pub use listeners::{Dispatch, ListenerKey, ListenerList, Notification, WeakListener};
pub use subscription::Subscription;
pub use utils::IndexNewToOld;
