use std::{
    cell::RefCell,
    collections::BTreeMap,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

use assert_call::{call, CallRecorder};

use super::*;

/// `(key, removed value, added value)` per notification, sorted by key.
type Log = Rc<RefCell<Vec<Vec<(&'static str, Option<i32>, Option<i32>)>>>>;

fn record(map: &ObservableMap<&'static str, i32>) -> (Log, Subscription) {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let l = log.clone();
    let s = map.subscribe(move |c| {
        let mut entries = Vec::new();
        while c.next() {
            let added = c.value_added().unwrap().map(|v| *v);
            entries.push((*c.key().unwrap(), c.value_removed().unwrap().copied(), added));
        }
        entries.sort();
        l.borrow_mut().push(entries);
    });
    (log, s)
}

fn take_log(log: &Log) -> Vec<Vec<(&'static str, Option<i32>, Option<i32>)>> {
    log.borrow_mut().drain(..).collect()
}

fn sorted(map: &ObservableMap<&'static str, i32>) -> BTreeMap<&'static str, i32> {
    map.items().iter().map(|(k, v)| (*k, *v)).collect()
}

#[test]
fn insert_replace_remove() {
    let map = ObservableMap::new();
    let (log, _s) = record(&map);
    assert_eq!(map.insert("a", 1), None);
    assert_eq!(map.insert("a", 2), Some(1));
    assert_eq!(map.remove("a"), Some(2));
    assert_eq!(map.remove("a"), None);
    assert_eq!(
        take_log(&log),
        vec![
            vec![("a", None, Some(1))],
            vec![("a", Some(1), Some(2))],
            vec![("a", Some(2), None)],
        ]
    );
}

#[test]
fn batch_folds_per_key() {
    let map = ObservableMap::from_iter([("a", 1), ("b", 2)]);
    let (log, _s) = record(&map);
    {
        let _b = map.batch();
        map.insert("a", 10);
        map.insert("a", 11);
        map.insert("c", 3);
        map.remove("c");
        map.remove("b");
        map.insert("d", 4);
    }
    assert_eq!(
        take_log(&log),
        vec![vec![
            ("a", Some(1), Some(11)),
            ("b", Some(2), None),
            ("d", None, Some(4)),
        ]]
    );
}

#[test]
fn panic_in_retain_reports_removals_later() {
    let map = ObservableMap::from_iter([("a", 1), ("b", 2)]);
    let (log, _s) = record(&map);
    let r = catch_unwind(AssertUnwindSafe(|| {
        map.retain(|_, v| {
            assert!(*v != 1, "rejected");
            false
        })
    }));
    assert!(r.is_err());
    assert!(take_log(&log).is_empty());
    assert_eq!(map.end_change(), Err(ChangeError::NotInBatch));

    let rest = sorted(&map);
    map.insert("c", 3);
    let mut expected: Vec<_> = [("b", 2), ("a", 1)]
        .into_iter()
        .filter(|(k, _)| !rest.contains_key(k))
        .map(|(k, v)| (k, Some(v), None))
        .collect();
    expected.push(("c", None, Some(3)));
    expected.sort();
    assert_eq!(take_log(&log), vec![expected]);
}

#[test]
fn replace_then_remove_reports_original_value() {
    let map = ObservableMap::from_iter([("a", 1)]);
    let (log, _s) = record(&map);
    {
        let _b = map.batch();
        map.insert("a", 2);
        map.remove("a");
    }
    assert_eq!(take_log(&log), vec![vec![("a", Some(1), None)]]);
}

#[test]
fn clear_extend_retain() {
    let map = ObservableMap::new();
    let (log, _s) = record(&map);
    map.extend([("a", 1), ("b", 2), ("c", 3)]);
    assert_eq!(take_log(&log)[0].len(), 3);

    map.retain(|_, v| *v != 2);
    assert_eq!(take_log(&log), vec![vec![("b", Some(2), None)]]);
    assert_eq!(sorted(&map), BTreeMap::from([("a", 1), ("c", 3)]));

    map.clear();
    assert_eq!(
        take_log(&log),
        vec![vec![("a", Some(1), None), ("c", Some(3), None)]]
    );
    map.clear();
    assert!(take_log(&log).is_empty());
}

#[test]
fn lookups() {
    let map = ObservableMap::from_iter([("a".to_string(), 1)]);
    assert_eq!(map.get("a").as_deref(), Some(&1));
    assert!(map.get("b").is_none());
    assert!(map.contains_key("a"));
    assert_eq!(map.len(), 1);
    assert!(!map.is_empty());
}

#[test]
fn invalidation_listener_once_per_batch() {
    let map = ObservableMap::new();
    map.add_invalidation_listener(|| call!("invalidated"));
    let mut cr = CallRecorder::new();
    {
        let _b = map.batch();
        map.insert(1, 'a');
        map.insert(2, 'b');
    }
    cr.verify("invalidated");
}

#[test]
fn weak_listeners() {
    let map = ObservableMap::new();
    let f = Rc::new(|_: &mut MapChange<i32, char>| call!("weak change"));
    let g = Rc::new(|| call!("weak invalidation"));
    map.add_weak_listener(&f);
    map.add_weak_invalidation_listener(&g);
    let mut cr = CallRecorder::new();
    map.insert(1, 'a');
    cr.verify(["weak change", "weak invalidation"]);
    drop(f);
    drop(g);
    map.insert(2, 'b');
    cr.verify(());
    assert_eq!(map.listener_count(), 0);
}

#[test]
fn end_change_without_begin_fails() {
    let map = ObservableMap::<i32, i32>::new();
    assert_eq!(map.end_change(), Err(ChangeError::NotInBatch));
}

#[test]
fn serde_round_trip() {
    let map = ObservableMap::from_iter([("a".to_string(), 1)]);
    assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"a":1}"#);
    let map: ObservableMap<String, i32> = serde_json::from_str(r#"{"x":5}"#).unwrap();
    assert_eq!(map.get("x").as_deref(), Some(&5));
}
