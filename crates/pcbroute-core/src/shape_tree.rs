//! Binary search tree over the shapes of board objects.
//!
//! Shapes live in the leaves; every inner node caches a bounding shape that
//! covers both of its children. A new shape descends into the child whose
//! bounding shape grows least in area, which keeps insertion at tree-height
//! cost without any rebalancing.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::Debug;

use slotmap::{new_key_type, SlotMap};

use crate::geometry::{BoundingDirections, BoundingShape, TileShape};

/// Identifies a shape tree towards the objects stored in it.
///
/// An object may expose different shapes to different trees, for example one
/// tree per clearance class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(pub u32);

new_key_type! {
    struct NodeKey;
}

/// Handle to a leaf of a [`ShapeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeafId(NodeKey);

/// Objects that can be stored in a [`ShapeTree`].
pub trait TreeStorable {
    /// What a leaf keeps to refer back to the object. Orders the leaves.
    type Ref: Clone + Ord + Debug;

    fn tree_ref(&self) -> Self::Ref;

    /// Number of shapes this object stores in `tree`.
    fn tree_shape_count(&self, tree: TreeId) -> usize;

    /// Shape number `index` of this object in `tree`.
    fn tree_shape(&self, tree: TreeId, index: usize) -> Option<TileShape>;

    /// Called after insertion with the leaves created for this object,
    /// so the object can remove itself cheaply later.
    fn record_tree_entries(&mut self, _tree: TreeId, _entries: &[LeafId]) {}
}

/// A single stored shape, as reported by queries.
///
/// Entries are ordered by the referenced object first and by the shape index second.
#[derive(Debug, Clone)]
pub struct TreeEntry<R> {
    pub object: R,
    pub shape_index: usize,
    pub leaf: LeafId,
}

impl<R: Ord> PartialEq for TreeEntry<R> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<R: Ord> Eq for TreeEntry<R> {}

impl<R: Ord> PartialOrd for TreeEntry<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R: Ord> Ord for TreeEntry<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.object
            .cmp(&other.object)
            .then(self.shape_index.cmp(&other.shape_index))
    }
}

/// Depth summary returned by [`ShapeTree::statistics`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeStatistics {
    pub entry_count: usize,
    pub average_depth: f64,
    pub max_depth: usize,
}

#[derive(Debug, Clone)]
enum NodeKind<R> {
    Inner { first: NodeKey, second: NodeKey },
    Leaf { object: R, shape_index: usize },
}

#[derive(Debug, Clone)]
struct Node<R> {
    bounding_shape: BoundingShape,
    parent: Option<NodeKey>,
    kind: NodeKind<R>,
}

/// Minimal-area-growth shape tree.
///
/// Writers need `&mut self`; queries take `&self` and allocate their own
/// traversal stack, so concurrent readers of a shared tree are fine.
#[derive(Debug, Clone)]
pub struct ShapeTree<R> {
    id: TreeId,
    bounding_directions: BoundingDirections,
    nodes: SlotMap<NodeKey, Node<R>>,
    root: Option<NodeKey>,
    leaf_count: usize,
    stack_capacity: usize,
}

impl<R: Clone + Ord + Debug> ShapeTree<R> {
    pub fn new(id: TreeId, bounding_directions: BoundingDirections) -> Self {
        Self {
            id,
            bounding_directions,
            nodes: SlotMap::with_key(),
            root: None,
            leaf_count: 0,
            stack_capacity: 64,
        }
    }

    /// Sets the initial capacity of the per-query traversal stack.
    pub fn with_stack_capacity(mut self, capacity: usize) -> Self {
        self.stack_capacity = capacity.max(1);
        self
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn bounding_directions(&self) -> BoundingDirections {
        self.bounding_directions
    }

    /// Number of leaves stored in the tree.
    pub fn len(&self) -> usize {
        self.leaf_count
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    // ── Insertion ────────────────────────────────────────────────────

    /// Inserts every shape of `object` and returns the created leaves.
    ///
    /// Shapes without a bounding shape are skipped.
    pub fn insert<O>(&mut self, object: &mut O) -> Vec<LeafId>
    where
        O: TreeStorable<Ref = R>,
    {
        let shape_count = object.tree_shape_count(self.id);
        let mut leaves = Vec::with_capacity(shape_count);
        for index in 0..shape_count {
            let Some(shape) = object.tree_shape(self.id, index) else {
                continue;
            };
            let Some(bounding_shape) = shape.bounding_shape(self.bounding_directions) else {
                log::warn!(
                    "ShapeTree::insert: shape {} of {:?} has no bounding shape",
                    index,
                    object.tree_ref()
                );
                continue;
            };
            leaves.push(self.insert_leaf(object.tree_ref(), index, bounding_shape));
        }
        if !leaves.is_empty() {
            object.record_tree_entries(self.id, &leaves);
        }
        leaves
    }

    /// Inserts a single leaf with an already computed bounding shape.
    pub fn insert_leaf(&mut self, object: R, shape_index: usize, bounding_shape: BoundingShape) -> LeafId {
        self.leaf_count += 1;
        let new_leaf = self.nodes.insert(Node {
            bounding_shape,
            parent: None,
            kind: NodeKind::Leaf {
                object,
                shape_index,
            },
        });

        let Some(root) = self.root else {
            self.root = Some(new_leaf);
            return LeafId(new_leaf);
        };

        let leaf_to_replace = self.position_locate(root, &bounding_shape);

        // Every added leaf comes with a new inner node above it.
        let old_leaf = self.node(leaf_to_replace);
        let new_bounds = bounding_shape.union(&old_leaf.bounding_shape);
        let curr_parent = old_leaf.parent;
        let new_inner = self.nodes.insert(Node {
            bounding_shape: new_bounds,
            parent: curr_parent,
            kind: NodeKind::Inner {
                first: leaf_to_replace,
                second: new_leaf,
            },
        });

        match curr_parent {
            Some(parent) => self.replace_child(parent, leaf_to_replace, new_inner),
            None => self.root = Some(new_inner),
        }
        self.node_mut(leaf_to_replace).parent = Some(new_inner);
        self.node_mut(new_leaf).parent = Some(new_inner);
        LeafId(new_leaf)
    }

    /// Descends to the leaf to be split for a new shape, widening every inner
    /// node on the way so that it covers the new shape.
    fn position_locate(&mut self, start: NodeKey, shape: &BoundingShape) -> NodeKey {
        let mut curr = start;
        loop {
            let node = self.node_mut(curr);
            node.bounding_shape = shape.union(&node.bounding_shape);
            let (first, second) = match node.kind {
                NodeKind::Inner { first, second } => (first, second),
                NodeKind::Leaf { .. } => return curr,
            };

            let first_shape = &self.node(first).bounding_shape;
            let first_increase = shape.union(first_shape).area() - first_shape.area();
            let second_shape = &self.node(second).bounding_shape;
            let second_increase = shape.union(second_shape).area() - second_shape.area();

            curr = if first_increase <= second_increase {
                first
            } else {
                second
            };
        }
    }

    // ── Removal ──────────────────────────────────────────────────────

    /// Removes the given leaves. Stale handles are ignored.
    pub fn remove(&mut self, entries: &[LeafId]) {
        for leaf in entries {
            self.remove_leaf(*leaf);
        }
    }

    /// Removes one leaf and splices out its parent. Returns false for a stale handle.
    pub fn remove_leaf(&mut self, leaf: LeafId) -> bool {
        match self.nodes.get(leaf.0) {
            Some(Node {
                kind: NodeKind::Leaf { .. },
                ..
            }) => {}
            _ => return false,
        }
        let Some(removed) = self.nodes.remove(leaf.0) else {
            return false;
        };
        self.leaf_count -= 1;

        let Some(parent) = removed.parent else {
            // the tree gets empty
            self.root = None;
            return true;
        };

        let parent_node = self
            .nodes
            .remove(parent)
            .expect("shape tree: parent of a leaf is missing");
        let sibling = match parent_node.kind {
            NodeKind::Inner { first, second } if second == leaf.0 => first,
            NodeKind::Inner { first, second } if first == leaf.0 => second,
            _ => panic!("shape tree: parent {parent:?} does not link to leaf {leaf:?}"),
        };

        let grand_parent = parent_node.parent;
        self.node_mut(sibling).parent = grand_parent;
        match grand_parent {
            None => self.root = Some(sibling),
            Some(grand_parent) => self.replace_child(grand_parent, parent, sibling),
        }

        // Shrink the ancestors as long as removing the leaf made them smaller.
        let mut node_to_recalculate = grand_parent;
        while let Some(curr) = node_to_recalculate {
            let (first, second) = self.children(curr);
            let new_bounds = self
                .node(second)
                .bounding_shape
                .union(&self.node(first).bounding_shape);
            let node = self.node_mut(curr);
            if new_bounds.contains(&node.bounding_shape) {
                break;
            }
            node.bounding_shape = new_bounds;
            node_to_recalculate = node.parent;
        }
        true
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// All leaves whose bounding shape intersects `shape`.
    pub fn overlaps(&self, shape: &BoundingShape) -> BTreeSet<TreeEntry<R>> {
        let mut found = BTreeSet::new();
        let Some(root) = self.root else {
            return found;
        };
        let mut stack = Vec::with_capacity(self.stack_capacity);
        stack.push(root);
        while let Some(curr) = stack.pop() {
            let node = self.node(curr);
            if !node.bounding_shape.intersects(shape) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf {
                    object,
                    shape_index,
                } => {
                    found.insert(TreeEntry {
                        object: object.clone(),
                        shape_index: *shape_index,
                        leaf: LeafId(curr),
                    });
                }
                NodeKind::Inner { first, second } => {
                    stack.push(*first);
                    stack.push(*second);
                }
            }
        }
        found
    }

    /// Like [`ShapeTree::overlaps`], for a tile shape bounded with this tree's directions.
    pub fn overlaps_tile(&self, shape: &TileShape) -> BTreeSet<TreeEntry<R>> {
        match shape.bounding_shape(self.bounding_directions) {
            Some(bounding_shape) => self.overlaps(&bounding_shape),
            None => BTreeSet::new(),
        }
    }

    /// All leaves from left to right.
    pub fn to_array(&self) -> Vec<LeafId> {
        let mut result = Vec::with_capacity(self.leaf_count);
        let Some(mut curr) = self.root else {
            return result;
        };
        loop {
            // go down to the leftmost leaf
            while let NodeKind::Inner { first, .. } = self.node(curr).kind {
                curr = first;
            }
            result.push(LeafId(curr));

            // go up while we are coming from a second child
            let mut parent = self.node(curr).parent;
            while let Some(p) = parent {
                let (_, second) = self.children(p);
                if second != curr {
                    break;
                }
                curr = p;
                parent = self.node(p).parent;
            }
            match parent {
                Some(p) => curr = self.children(p).1,
                None => break,
            }
        }
        result
    }

    pub fn entry(&self, leaf: LeafId) -> Option<TreeEntry<R>> {
        match &self.nodes.get(leaf.0)?.kind {
            NodeKind::Leaf {
                object,
                shape_index,
            } => Some(TreeEntry {
                object: object.clone(),
                shape_index: *shape_index,
                leaf,
            }),
            NodeKind::Inner { .. } => None,
        }
    }

    pub fn leaf_shape(&self, leaf: LeafId) -> Option<&BoundingShape> {
        self.nodes.get(leaf.0).map(|node| &node.bounding_shape)
    }

    /// Number of inner nodes between `leaf` and the root, counting the root.
    pub fn distance_to_root(&self, leaf: LeafId) -> Option<usize> {
        let mut result = 0;
        let mut parent = self.nodes.get(leaf.0)?.parent;
        while let Some(p) = parent {
            result += 1;
            parent = self.node(p).parent;
        }
        Some(result)
    }

    pub fn statistics(&self) -> TreeStatistics {
        let leaves = self.to_array();
        let mut cumulative_depth = 0usize;
        let mut max_depth = 0usize;
        for leaf in &leaves {
            let depth = self.distance_to_root(*leaf).unwrap_or(0);
            cumulative_depth += depth;
            max_depth = max_depth.max(depth);
        }
        let average_depth = if leaves.is_empty() {
            0.0
        } else {
            cumulative_depth as f64 / leaves.len() as f64
        };
        log::info!(
            "ShapeTree {:?}: {} entries, average depth {:.1}, maximum depth {}",
            self.id,
            leaves.len(),
            average_depth,
            max_depth
        );
        TreeStatistics {
            entry_count: leaves.len(),
            average_depth,
            max_depth,
        }
    }

    /// Recomputes every inner bounding shape from the leaves and checks that
    /// the cached shapes contain them. Also checks the parent links.
    pub fn check_bounds(&self) -> bool {
        match self.root {
            None => self.leaf_count == 0,
            Some(root) => {
                let mut leaves = 0;
                let ok = self.node(root).parent.is_none()
                    && self.check_subtree(root, &mut leaves).is_some();
                ok && leaves == self.leaf_count
            }
        }
    }

    fn check_subtree(&self, curr: NodeKey, leaves: &mut usize) -> Option<BoundingShape> {
        let node = self.node(curr);
        match node.kind {
            NodeKind::Leaf { .. } => {
                *leaves += 1;
                Some(node.bounding_shape)
            }
            NodeKind::Inner { first, second } => {
                if self.node(first).parent != Some(curr) || self.node(second).parent != Some(curr) {
                    log::warn!("ShapeTree::check_bounds: parent link of a child of {curr:?} is wrong");
                    return None;
                }
                let union = self
                    .check_subtree(first, leaves)?
                    .union(&self.check_subtree(second, leaves)?);
                if !node.bounding_shape.contains(&union) {
                    log::warn!("ShapeTree::check_bounds: bounding shape of {curr:?} is too small");
                    return None;
                }
                Some(union)
            }
        }
    }

    // ── Node access ──────────────────────────────────────────────────

    fn node(&self, handle: NodeKey) -> &Node<R> {
        self.nodes
            .get(handle)
            .expect("shape tree: dangling node key")
    }

    fn node_mut(&mut self, handle: NodeKey) -> &mut Node<R> {
        self.nodes
            .get_mut(handle)
            .expect("shape tree: dangling node key")
    }

    fn children(&self, handle: NodeKey) -> (NodeKey, NodeKey) {
        match self.node(handle).kind {
            NodeKind::Inner { first, second } => (first, second),
            NodeKind::Leaf { .. } => panic!("shape tree: leaf {handle:?} used as inner node"),
        }
    }

    fn replace_child(&mut self, parent: NodeKey, old_child: NodeKey, new_child: NodeKey) {
        match &mut self.node_mut(parent).kind {
            NodeKind::Inner { first, .. } if *first == old_child => *first = new_child,
            NodeKind::Inner { second, .. } if *second == old_child => *second = new_child,
            _ => panic!("shape tree: {parent:?} is not the parent of {old_child:?}"),
        }
    }
}
