//! Property-based invariant tests for the shape search tree.
//!
//! 1. overlaps() returns exactly the leaves a brute-force scan finds.
//! 2. Every cached bounding shape contains the union of its leaves after
//!    random insertions and removals.
//! 3. to_array() enumerates every leaf once, in a stable order.

use std::collections::BTreeSet;

use pcbroute_core::geometry::{BoundingDirections, BoundingShape, IntBox, TileShape};
use pcbroute_core::shape_tree::{LeafId, ShapeTree, TreeId, TreeStorable};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Block {
    id: u32,
    shape: TileShape,
}

impl TreeStorable for Block {
    type Ref = u32;

    fn tree_ref(&self) -> u32 {
        self.id
    }

    fn tree_shape_count(&self, _tree: TreeId) -> usize {
        1
    }

    fn tree_shape(&self, _tree: TreeId, _index: usize) -> Option<TileShape> {
        Some(self.shape.clone())
    }
}

fn tile() -> impl Strategy<Value = TileShape> {
    (-5000i64..5000, -5000i64..5000, 0i64..400, 0i64..400, any::<bool>()).prop_map(|(x, y, w, h, trace)| {
        if trace {
            TileShape::trace(
                pcbroute_core::Point::new(x, y),
                pcbroute_core::Point::new(x + w, y + h),
                w.min(h) / 4,
            )
        } else {
            TileShape::from_box(IntBox::new(x, y, x + w, y + h))
        }
    })
}

fn directions() -> impl Strategy<Value = BoundingDirections> {
    prop_oneof![Just(BoundingDirections::Orthogonal), Just(BoundingDirections::Octilinear)]
}

fn build(shapes: &[TileShape], directions: BoundingDirections) -> (ShapeTree<u32>, Vec<LeafId>) {
    let mut tree = ShapeTree::new(TreeId(0), directions);
    let mut leaves = Vec::new();
    for (i, shape) in shapes.iter().enumerate() {
        let mut block = Block {
            id: i as u32,
            shape: shape.clone(),
        };
        leaves.extend(tree.insert(&mut block));
    }
    (tree, leaves)
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Query soundness
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn overlaps_matches_brute_force(
        shapes in proptest::collection::vec(tile(), 1..500),
        query in tile(),
        directions in directions(),
    ) {
        let (tree, _) = build(&shapes, directions);
        let query_shape: BoundingShape = query.bounding_shape(directions).unwrap();

        let found: BTreeSet<u32> = tree.overlaps(&query_shape).into_iter().map(|e| e.object).collect();
        let expected: BTreeSet<u32> = shapes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.bounding_shape(directions).unwrap().intersects(&query_shape))
            .map(|(i, _)| i as u32)
            .collect();
        prop_assert_eq!(found, expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Union invariant after insert/remove
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn bounds_hold_after_removals(
        shapes in proptest::collection::vec(tile(), 1..120),
        removals in proptest::collection::vec(any::<prop::sample::Index>(), 0..60),
    ) {
        let (mut tree, mut leaves) = build(&shapes, BoundingDirections::Octilinear);
        prop_assert!(tree.check_bounds());
        for index in removals {
            if leaves.is_empty() {
                break;
            }
            let leaf = leaves.swap_remove(index.index(leaves.len()));
            prop_assert!(tree.remove_leaf(leaf));
            prop_assert!(tree.check_bounds());
        }
        prop_assert_eq!(tree.len(), leaves.len());
        prop_assert_eq!(tree.is_empty(), leaves.is_empty());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Leaf enumeration
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn to_array_lists_every_leaf_once(shapes in proptest::collection::vec(tile(), 0..200)) {
        let (tree, leaves) = build(&shapes, BoundingDirections::Orthogonal);
        let listed = tree.to_array();
        prop_assert_eq!(listed.len(), shapes.len());
        let unique: BTreeSet<LeafId> = listed.iter().copied().collect();
        let inserted: BTreeSet<LeafId> = leaves.into_iter().collect();
        prop_assert_eq!(unique, inserted);
        prop_assert_eq!(tree.to_array(), listed);
    }
}
