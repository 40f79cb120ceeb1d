
use self::test_utils::*;
use observable_collections::*;
use proptest::prelude::*;
use std::{cell::RefCell, collections::HashSet, rc::Rc};

#[derive(Clone, Debug)]
enum Op {
    Insert(u8, i32),
    Remove(u8),
    Retain(i32),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..6, any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => (0u8..6).prop_map(Op::Remove),
        1 => (2i32..4).prop_map(Op::Retain),
        1 => Just(Op::Clear),
    ]
}

fn apply(map: &ObservableMap<u8, i32>, op: &Op) {
    match *op {
        Op::Insert(k, v) => {
            map.insert(k, v);
        }
        Op::Remove(k) => {
            map.remove(&k);
        }
        Op::Retain(m) => map.retain(|_, v| v % m != 0),
        Op::Clear => map.clear(),
    }
}

proptest! {
    #[test]
    fn map_mirror_follows_batches(
        batches in proptest::collection::vec(proptest::collection::vec(op(), 0..10), 0..5),
    ) {
        let map = ObservableMap::new();
        let mirror = MapMirror::new(&map);
        for ops in &batches {
            {
                let _b = map.batch();
                for op in ops {
                    apply(&map, op);
                }
            }
            prop_assert_eq!(mirror.items(), map.items().clone());
        }
    }
}

#[test]
fn set_mirror_follows_batches() {
    let set = ObservableSet::from_iter([1, 2, 3]);
    let mirror = Rc::new(RefCell::new(set.items().clone()));
    let m = mirror.clone();
    let _s = set.subscribe(move |c| {
        let mut m = m.borrow_mut();
        while c.next() {
            let e = *c.element().unwrap();
            if c.was_removed().unwrap() {
                assert!(m.remove(&e));
            }
            if c.was_added().unwrap() {
                assert!(m.insert(e));
            }
        }
    });
    {
        let _b = set.batch();
        set.remove(&1);
        set.insert(1);
        set.insert(4);
        set.remove(&2);
        set.insert(5);
        set.remove(&5);
    }
    assert_eq!(*mirror.borrow(), set.items().clone());
    assert_eq!(*mirror.borrow(), HashSet::from([1, 3, 4]));
}

#[test]
fn map_listener_added_and_removed_within_notification() {
    let map = ObservableMap::<&str, i32>::new();
    let key = Rc::new(RefCell::new(None));
    let k = key.clone();
    let m = map.clone();
    *key.borrow_mut() = Some(map.add_listener(move |_| {
        if let Some(key) = k.borrow_mut().take() {
            assert!(m.remove_listener(key));
        }
    }));
    map.insert("a", 1);
    assert_eq!(map.listener_count(), 0);
    map.insert("b", 2);
}
