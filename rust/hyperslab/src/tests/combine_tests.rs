use hyperslab_testkit::{DenseMask, SelectionGen};

use super::{OPS, mask_op, params_mask, select, to_mask};
use crate::{Block, SelectOp, Selection, SelectionType, UNLIMITED};

#[test]
fn test_four_blocks_in_square() {
    let sel = Selection::hyperslab(
        vec![10, 10],
        &[2, 2],
        Some(&[3, 3]),
        &[2, 2],
        Some(&[2, 2]),
    )
    .unwrap();
    assert_eq!(sel.num_elements(), 16);
    assert_eq!(sel.num_blocks(), 4);
    assert_eq!(sel.bounds(), Some(Block::new(vec![2, 2], vec![6, 6])));
    for corner in [[2, 2], [2, 5], [5, 2], [5, 5]] {
        assert!(sel.contains(&corner));
        assert!(sel.contains(&[corner[0] + 1, corner[1] + 1]));
    }
    assert!(!sel.contains(&[4, 4]));
}

#[test]
fn test_and_of_overlapping_squares() {
    let a = Selection::hyperslab(vec![10, 10], &[0, 0], None, &[1, 1], Some(&[5, 5])).unwrap();
    let b = Selection::hyperslab(vec![10, 10], &[3, 3], None, &[1, 1], Some(&[5, 5])).unwrap();
    let and = a.combine(SelectOp::And, &b).unwrap();
    assert_eq!(and.num_elements(), 4);
    assert_eq!(and.bounds(), Some(Block::new(vec![3, 3], vec![4, 4])));
    assert_eq!(and.block_list().unwrap(), vec![Block::new(vec![3, 3], vec![4, 4])]);

    let or = a.combine(SelectOp::Or, &b).unwrap();
    assert_eq!(or.num_elements(), 46);
    let xor = a.combine(SelectOp::Xor, &b).unwrap();
    assert_eq!(xor.num_elements(), 42);
}

#[test]
fn test_self_combination_is_idempotent() {
    let mut generator = SelectionGen::with_seed(6412384656);
    for _ in 0..50 {
        let extent = generator.extent(2, 12);
        let mut sel = Selection::none(extent.clone());
        select(&mut sel, SelectOp::Set, &generator.hyperslab(&extent));
        select(&mut sel, SelectOp::Or, &generator.hyperslab(&extent));
        let expected = to_mask(&sel);

        let or = sel.combine(SelectOp::Or, &sel).unwrap();
        assert_eq!(to_mask(&or), expected);
        let and = sel.combine(SelectOp::And, &sel).unwrap();
        assert_eq!(to_mask(&and), expected);
        let xor = sel.combine(SelectOp::Xor, &sel).unwrap();
        assert_eq!(xor.num_elements(), 0);
    }
}

#[test]
fn test_disjoint_operands() {
    let a = Selection::hyperslab(vec![8, 8], &[0, 0], Some(&[2, 2]), &[2, 2], None).unwrap();
    let b = Selection::hyperslab(vec![8, 8], &[5, 5], None, &[1, 1], Some(&[3, 3])).unwrap();
    assert_eq!(a.combine(SelectOp::And, &b).unwrap().select_type(), SelectionType::None);
    let or = a.combine(SelectOp::Or, &b).unwrap();
    assert_eq!(or.num_elements(), a.num_elements() + b.num_elements());
    assert_eq!(a.combine(SelectOp::NotB, &b).unwrap().num_elements(), a.num_elements());
}

#[test]
fn test_random_hyperslab_sequences_match_mask() {
    let mut generator = SelectionGen::with_seed(297135646);
    for round in 0..300 {
        let rank = 1 + round % 3;
        let extent = generator.extent(rank, 10);
        let mut sel = Selection::none(extent.clone());
        let mut expected = DenseMask::new(&extent);
        for step in 0..6 {
            let op = if step == 0 {
                SelectOp::Set
            } else {
                OPS[generator.pick(OPS.len())]
            };
            let params = generator.hyperslab(&extent);
            select(&mut sel, op, &params);
            expected.apply(mask_op(op), &params_mask(&extent, &params));

            assert_eq!(sel.num_elements(), expected.count(), "round {round} step {step}");
            assert_eq!(to_mask(&sel), expected, "round {round} step {step}");
            let bounds = sel.bounds().map(|b| (b.start, b.end));
            assert_eq!(bounds, expected.bounds(), "round {round} step {step}");
        }
    }
}

#[test]
fn test_random_selection_combinations_match_mask() {
    let mut generator = SelectionGen::with_seed(1337);
    for _ in 0..150 {
        let extent = generator.extent(2, 9);
        let mut a = Selection::none(extent.clone());
        let mut b = Selection::none(extent.clone());
        for sel in [&mut a, &mut b] {
            select(sel, SelectOp::Set, &generator.hyperslab(&extent));
            select(sel, SelectOp::Or, &generator.hyperslab(&extent));
        }
        for op in OPS {
            let combined = a.combine(op, &b).unwrap();
            let mut expected = to_mask(&a);
            expected.apply(mask_op(op), &to_mask(&b));
            assert_eq!(to_mask(&combined), expected, "{op:?}");
        }
    }
}

#[test]
fn test_all_selection_in_algebra() {
    let extent = vec![6, 7];
    let all = Selection::all(extent.clone());
    let slab = Selection::hyperslab(extent.clone(), &[1, 2], Some(&[3, 2]), &[2, 3], None).unwrap();
    for op in OPS {
        let combined = all.combine(op, &slab).unwrap();
        let mut expected = DenseMask::full(&extent);
        expected.apply(mask_op(op), &to_mask(&slab));
        assert_eq!(to_mask(&combined), expected, "All {op:?} hyperslab");

        let combined = slab.combine(op, &all).unwrap();
        let mut expected = to_mask(&slab);
        expected.apply(mask_op(op), &DenseMask::full(&extent));
        assert_eq!(to_mask(&combined), expected, "hyperslab {op:?} All");
    }
    assert_eq!(
        slab.combine(SelectOp::Or, &all).unwrap().num_elements(),
        42
    );
}

#[test]
fn test_zero_count_operand() {
    let base = Selection::hyperslab(vec![10], &[2], None, &[3], None).unwrap();
    for op in OPS {
        let sel = base
            .combine_hyperslab(op, &[4], None, &[0], None)
            .unwrap();
        let unchanged = matches!(op, SelectOp::Or | SelectOp::Xor | SelectOp::NotB);
        let expected = if unchanged { 3 } else { 0 };
        assert_eq!(sel.num_elements(), expected, "{op:?}");
    }
}

#[test]
fn test_invalid_hyperslab_arguments() {
    let mut sel = Selection::all(vec![10, 10]);
    assert!(sel.select_hyperslab(SelectOp::Set, &[0, 0], Some(&[0, 1]), &[1, 1], None).is_err());
    assert!(
        sel.select_hyperslab(SelectOp::Set, &[0, 0], Some(&[1, 2]), &[1, 2], Some(&[1, 3]))
            .is_err()
    );
    assert!(sel.select_hyperslab(SelectOp::Set, &[0], None, &[1], None).is_err());
    assert!(
        sel.select_hyperslab(
            SelectOp::Set,
            &[0, 0],
            None,
            &[UNLIMITED, UNLIMITED],
            None
        )
        .is_err()
    );
    assert!(
        sel.select_hyperslab(SelectOp::Set, &[0, 0], None, &[UNLIMITED, 1], Some(&[UNLIMITED, 1]))
            .is_err()
    );
    // failed calls leave the selection untouched
    assert_eq!(sel.select_type(), SelectionType::All);
}

#[test]
fn test_unlimited_operands() {
    let finite = Selection::hyperslab(vec![20], &[0], None, &[10], None).unwrap();
    let unlimited = Selection::hyperslab(vec![20], &[5], Some(&[3]), &[UNLIMITED], Some(&[2])).unwrap();

    let and = finite.combine(SelectOp::And, &unlimited).unwrap();
    assert_eq!(to_mask(&and).coords(), vec![vec![5], vec![6], vec![8], vec![9]]);
    let not_b = finite.combine(SelectOp::NotB, &unlimited).unwrap();
    assert_eq!(not_b.num_elements(), 6);
    assert!(finite.combine(SelectOp::Or, &unlimited).is_err());
    assert!(finite.combine(SelectOp::Xor, &unlimited).is_err());

    let and = unlimited.combine(SelectOp::And, &finite).unwrap();
    assert_eq!(and.num_elements(), 4);
    assert_eq!(and.unlimited_dim(), None);
    let not_a = unlimited.combine(SelectOp::NotA, &finite).unwrap();
    assert_eq!(to_mask(&not_a).coords(), vec![vec![0], vec![1], vec![2], vec![3], vec![4], vec![7]]);
    assert!(unlimited.combine(SelectOp::Or, &finite).is_err());
    assert!(unlimited.combine(SelectOp::NotB, &finite).is_err());
    assert!(unlimited.combine(SelectOp::And, &unlimited).is_err());

    let replaced = unlimited.combine(SelectOp::Set, &finite).unwrap();
    assert_eq!(replaced.num_elements(), 10);
}
