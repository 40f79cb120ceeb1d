
use self::test_utils::*;
use observable_collections::*;
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

#[derive(Clone, Debug)]
enum Op {
    Push,
    Insert(usize),
    InsertAll(usize, usize),
    Remove(usize),
    RemoveRange(usize, usize),
    Set(usize),
    Update(usize),
    Swap(usize, usize),
    Move(usize, usize),
    Reverse,
    Rotate(isize),
    Sort,
    Shuffle(u64),
    Retain(u32),
    SetAll(usize),
    Clear,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Push),
        any::<usize>().prop_map(Op::Insert),
        (any::<usize>(), 0usize..4).prop_map(|(i, n)| Op::InsertAll(i, n)),
        any::<usize>().prop_map(Op::Remove),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::RemoveRange(a, b)),
        any::<usize>().prop_map(Op::Set),
        any::<usize>().prop_map(Op::Update),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Swap(a, b)),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Move(a, b)),
        Just(Op::Reverse),
        (-5isize..5).prop_map(Op::Rotate),
        Just(Op::Sort),
        any::<u64>().prop_map(Op::Shuffle),
        (2u32..4).prop_map(Op::Retain),
        (0usize..5).prop_map(Op::SetAll),
        Just(Op::Clear),
    ]
}

fn apply(list: &ObservableVec<u32>, op: &Op, next: &mut u32) {
    let len = list.len();
    let mut fresh = || {
        *next += 1;
        *next
    };
    match *op {
        Op::Push => list.push(fresh()),
        Op::Insert(i) => list.insert(i % (len + 1), fresh()).unwrap(),
        Op::InsertAll(i, n) => {
            let values: Vec<u32> = (0..n).map(|_| fresh()).collect();
            list.insert_all(i % (len + 1), values).unwrap()
        }
        Op::Remove(i) if len > 0 => {
            list.remove(i % len).unwrap();
        }
        Op::RemoveRange(a, b) => {
            let (a, b) = (a % (len + 1), b % (len + 1));
            list.remove_range(a.min(b)..a.max(b)).unwrap()
        }
        Op::Set(i) if len > 0 => {
            list.set(i % len, fresh()).unwrap();
        }
        Op::Update(i) if len > 0 => list.update(i % len, |x| *x += 1000).unwrap(),
        Op::Swap(a, b) if len > 0 => list.swap(a % len, b % len).unwrap(),
        Op::Move(a, b) if len > 0 => list.move_item(a % len, b % len).unwrap(),
        Op::Reverse => list.reverse(),
        Op::Rotate(d) => list.rotate(d),
        Op::Sort => list.sort(),
        Op::Shuffle(seed) => list.shuffle(&mut StdRng::seed_from_u64(seed)),
        Op::Retain(m) => list.retain(|x| x % m != 0),
        Op::SetAll(n) => {
            let values: Vec<u32> = (0..n).map(|_| fresh()).collect();
            list.set_all(values)
        }
        Op::Clear => list.clear(),
        _ => {}
    }
}

proptest! {
    #[test]
    fn mirror_follows_single_edits(len in 0u32..8, ops in proptest::collection::vec(op(), 0..16)) {
        let list: ObservableVec<u32> = (0..len).collect();
        let mirror = ListMirror::new(&list);
        let mut next = 100;
        for op in &ops {
            apply(&list, op, &mut next);
            prop_assert_eq!(mirror.items(), list.to_vec());
        }
    }

    #[test]
    fn mirror_follows_batches(
        len in 0u32..8,
        batches in proptest::collection::vec(proptest::collection::vec(op(), 0..12), 0..4),
    ) {
        let list: ObservableVec<u32> = (0..len).collect();
        let mirror = ListMirror::new(&list);
        let mut next = 100;
        for ops in &batches {
            {
                let _b = list.batch();
                for op in ops {
                    apply(&list, op, &mut next);
                }
            }
            prop_assert!(mirror.take_notifications() <= 1);
            prop_assert_eq!(mirror.items(), list.to_vec());
        }
    }
}

#[test]
fn set_all_then_edits_in_one_batch() {
    let list = ObservableVec::from(vec!['a', 'b', 'c']);
    let mirror = ListMirror::new(&list);
    {
        let _b = list.batch();
        list.set_all(['x', 'y']);
        list.insert(0, 'z').unwrap();
        list.reverse();
    }
    assert_eq!(mirror.take_notifications(), 1);
    assert_eq!(list.to_vec(), vec!['y', 'x', 'z']);
    assert_eq!(mirror.items(), list.to_vec());
}

#[test]
fn listener_sees_set_equivalence() {
    let list = ObservableVec::from(vec![1, 2, 3]);
    let _s = list.subscribe(|c| {
        assert!(c.next());
        assert_eq!(c.from(), Ok(0));
        assert_eq!(c.to(), Ok(2));
        assert_eq!(c.removed(), Ok(&[1, 2, 3][..]));
        assert_eq!(c.was_replaced(), Ok(true));
        assert!(!c.next());
    });
    list.set_all([7, 8]);
}

#[test]
fn errors_report_illegal_state() {
    let list = ObservableVec::<i32>::new();
    let e = list.end_change().unwrap_err();
    assert!(e.is_illegal_state());
    assert_eq!(e.to_string(), "`begin_change` was not called");
    let e = list.remove(0).unwrap_err();
    assert!(!e.is_illegal_state());
    assert_eq!(e.to_string(), "index 0 out of bounds for length 0");
}
