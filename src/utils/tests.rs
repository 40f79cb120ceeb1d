use super::*;

#[test]
fn build_old_to_new_inverts() {
    let p = IndexNewToOld::new(&[2, 0, 1]);
    assert_eq!(p.build_old_to_new(), vec![1, 2, 0]);
}

#[test]
fn apply_to_reorders() {
    let mut items = vec!['a', 'b', 'c', 'd'];
    IndexNewToOld::new(&[3, 1, 0, 2]).apply_to(&mut items);
    assert_eq!(items, vec!['d', 'b', 'a', 'c']);
}

#[test]
fn identity() {
    assert!(IndexNewToOld::new(&[0, 1, 2]).is_identity());
    assert!(!IndexNewToOld::new(&[1, 0]).is_identity());
}

#[test]
fn permutation_check() {
    assert!(is_permutation_of(&[3, 2], 2, 4));
    assert!(!is_permutation_of(&[2, 2], 2, 4));
    assert!(!is_permutation_of(&[1, 2], 2, 4));
    assert!(!is_permutation_of(&[2], 2, 4));
}

#[test]
fn to_range_bounds() {
    assert_eq!(to_range(.., 4), Ok(0..4));
    assert_eq!(to_range(1..=2, 4), Ok(1..3));
    assert_eq!(
        to_range(2..5, 4),
        Err(ChangeError::OutOfBounds { index: 5, len: 4 })
    );
    #[allow(clippy::reversed_empty_ranges)]
    let r = to_range(3..1, 4);
    assert_eq!(r, Err(ChangeError::InvalidRange { from: 3, to: 1 }));
}
