use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delaunay::{PlanarDelaunayTriangulation, TriangulationStorable};
use crate::error::BoardError;
use crate::geometry::{IntBox, Point, TileShape};
use crate::settings::CoreSettings;
use crate::shape_tree::{LeafId, ShapeTree, TreeId, TreeStorable};
use crate::undo::{Changes, Storable, UndoableObjects};

/// Unique identifier for a board item. Never reused within a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetId(pub u32);

/// Signal layer index, 0 is the top layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Pin,
    Trace,
    Via,
}

/// A routable object on the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub net: NetId,
    pub layer: LayerId,
    /// Shapes stored in the search tree.
    pub shapes: Vec<TileShape>,
    /// Connection points used for the rats nest.
    pub corners: Vec<Point>,
}

impl Item {
    pub fn translate(&mut self, dx: i64, dy: i64) {
        self.shapes = self.shapes.iter().map(|s| s.translate(dx, dy)).collect();
        for corner in &mut self.corners {
            *corner = corner.translate(dx, dy);
        }
    }
}

impl Storable for Item {
    type Key = ItemId;

    fn key(&self) -> ItemId {
        self.id
    }
}

impl TreeStorable for Item {
    type Ref = ItemId;

    fn tree_ref(&self) -> ItemId {
        self.id
    }

    fn tree_shape_count(&self, _tree: TreeId) -> usize {
        self.shapes.len()
    }

    fn tree_shape(&self, _tree: TreeId, index: usize) -> Option<TileShape> {
        self.shapes.get(index).cloned()
    }
}

impl TriangulationStorable for Item {
    fn triangulation_corners(&self) -> Vec<Point> {
        self.corners.clone()
    }
}

/// An incomplete connection of a net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirLine {
    pub net: NetId,
    pub from_item: ItemId,
    pub from: Point,
    pub to_item: ItemId,
    pub to: Point,
}

impl AirLine {
    pub fn length_square(&self) -> f64 {
        self.from.to_float().distance_square(&self.to.to_float())
    }
}

/// Serialized form of a board: the visible items without undo history.
#[derive(Serialize, Deserialize)]
struct BoardData {
    id: Uuid,
    name: String,
    settings: CoreSettings,
    items: Vec<Item>,
}

/// The routing board: items in an undoable store, indexed by a shape search tree.
#[derive(Debug)]
pub struct Board {
    /// Board identifier.
    pub id: Uuid,
    /// Project name.
    pub name: String,
    settings: CoreSettings,
    items: UndoableObjects<Item>,
    search_tree: ShapeTree<ItemId>,
    /// Leaves of the visible items in the search tree.
    tree_entries: BTreeMap<ItemId, Vec<LeafId>>,
    next_item_no: u32,
}

impl Board {
    pub fn new(name: &str) -> Self {
        Self::with_settings(name, CoreSettings::default())
    }

    pub fn with_settings(name: &str, settings: CoreSettings) -> Self {
        let search_tree = ShapeTree::new(TreeId(0), settings.bounding_directions)
            .with_stack_capacity(settings.tree_stack_capacity);
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            settings,
            items: UndoableObjects::new(),
            search_tree,
            tree_entries: BTreeMap::new(),
            next_item_no: 1,
        }
    }

    pub fn settings(&self) -> &CoreSettings {
        &self.settings
    }

    pub fn search_tree(&self) -> &ShapeTree<ItemId> {
        &self.search_tree
    }

    // ── Item management ──────────────────────────────────────────────

    /// A square pad centered at `center`.
    pub fn add_pin(&mut self, net: NetId, layer: LayerId, center: Point, half_width: i64) -> ItemId {
        let pad = IntBox::new(
            center.x - half_width,
            center.y - half_width,
            center.x + half_width,
            center.y + half_width,
        );
        self.insert_item(ItemKind::Pin, net, layer, vec![TileShape::from_box(pad)], vec![center])
    }

    pub fn add_trace(&mut self, net: NetId, layer: LayerId, from: Point, to: Point, half_width: i64) -> ItemId {
        self.insert_item(
            ItemKind::Trace,
            net,
            layer,
            vec![TileShape::trace(from, to, half_width)],
            vec![from, to],
        )
    }

    pub fn add_via(&mut self, net: NetId, layer: LayerId, center: Point, radius: i64) -> ItemId {
        self.insert_item(
            ItemKind::Via,
            net,
            layer,
            vec![TileShape::trace(center, center, radius)],
            vec![center],
        )
    }

    pub fn insert_item(
        &mut self,
        kind: ItemKind,
        net: NetId,
        layer: LayerId,
        shapes: Vec<TileShape>,
        corners: Vec<Point>,
    ) -> ItemId {
        let id = ItemId(self.next_item_no);
        self.next_item_no += 1;
        let item = Item {
            id,
            kind,
            net,
            layer,
            shapes,
            corners,
        };
        self.index_item(item.clone());
        self.items.insert(item);
        id
    }

    pub fn get_item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn remove_item(&mut self, id: ItemId) -> Result<Item, BoardError> {
        let item = self.items.get(&id).cloned().ok_or(BoardError::UnknownItem(id))?;
        self.items.delete(&id);
        self.unindex_item(id);
        Ok(item)
    }

    pub fn move_item(&mut self, id: ItemId, dx: i64, dy: i64) -> Result<(), BoardError> {
        if !self.items.contains(&id) {
            return Err(BoardError::UnknownItem(id));
        }
        self.items.modify(&id, |item| item.translate(dx, dy))?;
        self.unindex_item(id);
        let item = self.items.get(&id).cloned().ok_or(BoardError::UnknownItem(id))?;
        self.index_item(item);
        Ok(())
    }

    /// Items on `layer` whose bounding shapes overlap `shape`.
    pub fn overlapping_items(&self, layer: LayerId, shape: &TileShape) -> BTreeSet<ItemId> {
        self.search_tree
            .overlaps_tile(shape)
            .into_iter()
            .map(|entry| entry.object)
            .filter(|id| self.items.get(id).is_some_and(|item| item.layer == layer))
            .collect()
    }

    // ── Undo / Redo ──────────────────────────────────────────────────

    pub fn generate_snapshot(&mut self) {
        self.items.generate_snapshot();
    }

    pub fn pop_snapshot(&mut self) -> bool {
        self.items.pop_snapshot()
    }

    /// Restores the situation before the last snapshot. Returns the nets of
    /// the changed items, or `None` if no more undo is possible.
    pub fn undo(&mut self) -> Option<BTreeSet<NetId>> {
        let changes = self.items.undo()?;
        Some(self.apply_changes(changes))
    }

    /// Restores the situation before the last undo. Returns the nets of the
    /// changed items, or `None` if no more redo is possible.
    pub fn redo(&mut self) -> Option<BTreeSet<NetId>> {
        let changes = self.items.redo()?;
        Some(self.apply_changes(changes))
    }

    pub fn can_undo(&self) -> bool {
        self.items.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.items.can_redo()
    }

    fn apply_changes(&mut self, changes: Changes<Item>) -> BTreeSet<NetId> {
        let mut changed_nets = BTreeSet::new();
        for item in &changes.cancelled {
            self.unindex_item(item.id);
            changed_nets.insert(item.net);
        }
        for item in changes.restored {
            changed_nets.insert(item.net);
            self.index_item(item);
        }
        log::debug!("Board {}: {} nets changed", self.name, changed_nets.len());
        changed_nets
    }

    fn index_item(&mut self, mut item: Item) {
        let leaves = self.search_tree.insert(&mut item);
        if let Some(old) = self.tree_entries.insert(item.id, leaves) {
            log::warn!("Board: item {:?} was indexed twice", item.id);
            self.search_tree.remove(&old);
        }
    }

    fn unindex_item(&mut self, id: ItemId) {
        if let Some(leaves) = self.tree_entries.remove(&id) {
            self.search_tree.remove(&leaves);
        }
    }

    // ── Rats nest ────────────────────────────────────────────────────

    /// The incomplete connections of `net`.
    ///
    /// The corners of the net items are triangulated and the triangulation
    /// edges are taken shortest first, skipping every edge between items
    /// already connected. Items with a common corner count as connected.
    pub fn airlines(&self, net: NetId) -> Result<Vec<AirLine>, BoardError> {
        let net_items: Vec<Item> = self.items.iter().filter(|item| item.net == net).cloned().collect();
        let mut rng = StdRng::seed_from_u64(self.settings.triangulation_seed);
        let triangulation = PlanarDelaunayTriangulation::with_rng(&net_items, &mut rng)?;

        let mut edges = triangulation.get_edge_lines();
        edges.sort_by(|a, b| a.length_square().total_cmp(&b.length_square()));

        let mut components = UnionFind::new(net_items.iter().map(|item| item.id));
        let mut result = Vec::new();
        for edge in edges {
            let (from_item, to_item) = (edge.start_object.id, edge.end_object.id);
            if !components.union(from_item, to_item) {
                continue;
            }
            if edge.start_point != edge.end_point {
                result.push(AirLine {
                    net,
                    from_item,
                    from: edge.start_point,
                    to_item,
                    to: edge.end_point,
                });
            }
        }
        log::debug!("Net {:?}: {} airlines between {} items", net, result.len(), net_items.len());
        Ok(result)
    }

    // ── Serialization ────────────────────────────────────────────────

    /// Serializes the visible items and the settings. The undo history is not saved.
    pub fn to_json(&self) -> Result<String, BoardError> {
        let data = BoardData {
            id: self.id,
            name: self.name.clone(),
            settings: self.settings.clone(),
            items: self.items.iter().cloned().collect(),
        };
        Ok(serde_json::to_string_pretty(&data)?)
    }

    pub fn from_json(json: &str) -> Result<Self, BoardError> {
        let data: BoardData = serde_json::from_str(json)?;
        let mut board = Self::with_settings(&data.name, data.settings);
        board.id = data.id;
        for item in data.items {
            board.next_item_no = board.next_item_no.max(item.id.0 + 1);
            board.index_item(item.clone());
            board.items.insert(item);
        }
        Ok(board)
    }
}

/// Disjoint sets of items, for the rats nest.
struct UnionFind {
    index: BTreeMap<ItemId, usize>,
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(items: impl Iterator<Item = ItemId>) -> Self {
        let index: BTreeMap<ItemId, usize> = items.enumerate().map(|(i, id)| (id, i)).collect();
        let parent = (0..index.len()).collect();
        Self { index, parent }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    /// Joins the sets of `a` and `b`. Returns false if they were already joined.
    fn union(&mut self, a: ItemId, b: ItemId) -> bool {
        let (Some(&a), Some(&b)) = (self.index.get(&a), self.index.get(&b)) else {
            return false;
        };
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a == root_b {
            return false;
        }
        self.parent[root_b] = root_a;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET: NetId = NetId(1);
    const TOP: LayerId = LayerId(0);

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn probe(x: i64, y: i64) -> TileShape {
        TileShape::from_box(IntBox::new(x - 1, y - 1, x + 1, y + 1))
    }

    #[test]
    fn test_board_create() {
        let board = Board::new("test_project");
        assert_eq!(board.name, "test_project");
        assert_eq!(board.item_count(), 0);
        assert!(!board.can_undo());
    }

    #[test]
    fn test_add_and_query_items() {
        let mut board = Board::new("test");
        let pin = board.add_pin(NET, TOP, Point::new(100, 100), 10);
        let trace = board.add_trace(NET, LayerId(1), Point::new(100, 100), Point::new(500, 100), 5);
        assert_eq!(board.item_count(), 2);
        assert_eq!(board.search_tree().len(), 2);
        assert_eq!(board.overlapping_items(TOP, &probe(100, 100)), BTreeSet::from([pin]));
        assert_eq!(board.overlapping_items(LayerId(1), &probe(300, 100)), BTreeSet::from([trace]));
        assert!(board.overlapping_items(TOP, &probe(300, 100)).is_empty());
    }

    #[test]
    fn test_move_and_undo() {
        init_logger();
        let mut board = Board::new("test");
        let pin = board.add_pin(NET, TOP, Point::new(100, 100), 10);
        board.generate_snapshot();
        board.move_item(pin, 1000, 0).unwrap();
        assert!(board.overlapping_items(TOP, &probe(100, 100)).is_empty());
        assert_eq!(board.overlapping_items(TOP, &probe(1100, 100)), BTreeSet::from([pin]));

        let nets = board.undo().unwrap();
        assert_eq!(nets, BTreeSet::from([NET]));
        assert_eq!(board.get_item(pin).unwrap().corners, vec![Point::new(100, 100)]);
        assert_eq!(board.overlapping_items(TOP, &probe(100, 100)), BTreeSet::from([pin]));
        assert!(board.overlapping_items(TOP, &probe(1100, 100)).is_empty());
        assert_eq!(board.search_tree().len(), 1);

        board.redo().unwrap();
        assert_eq!(board.overlapping_items(TOP, &probe(1100, 100)), BTreeSet::from([pin]));
        assert_eq!(board.search_tree().len(), 1);
    }

    #[test]
    fn test_remove_and_undo() {
        init_logger();
        let mut board = Board::new("test");
        let pin = board.add_pin(NET, TOP, Point::new(0, 0), 10);
        board.generate_snapshot();
        let removed = board.remove_item(pin).unwrap();
        assert_eq!(removed.id, pin);
        assert!(board.search_tree().is_empty());
        assert!(matches!(board.remove_item(pin), Err(BoardError::UnknownItem(id)) if id == pin));

        board.undo().unwrap();
        assert!(board.get_item(pin).is_some());
        assert_eq!(board.overlapping_items(TOP, &probe(0, 0)), BTreeSet::from([pin]));
        assert!(board.search_tree().check_bounds());
    }

    #[test]
    fn test_unknown_item() {
        let mut board = Board::new("test");
        let err = board.move_item(ItemId(42), 1, 1).unwrap_err();
        assert!(matches!(err, BoardError::UnknownItem(ItemId(42))));
    }

    #[test]
    fn test_airlines() {
        init_logger();
        let mut board = Board::new("test");
        let a = board.add_pin(NET, TOP, Point::new(100, 200), 10);
        let b = board.add_pin(NET, TOP, Point::new(1100, 200), 10);
        let c = board.add_pin(NET, TOP, Point::new(100, 1200), 10);
        board.add_pin(NetId(2), TOP, Point::new(600, 600), 10);

        let airlines = board.airlines(NET).unwrap();
        assert_eq!(airlines.len(), 2);
        let pairs: BTreeSet<(ItemId, ItemId)> = airlines
            .iter()
            .map(|l| (l.from_item.min(l.to_item), l.from_item.max(l.to_item)))
            .collect();
        assert_eq!(pairs, BTreeSet::from([(a, b), (a, c)]));

        // a trace between a and b connects them
        board.add_trace(NET, TOP, Point::new(100, 200), Point::new(1100, 200), 5);
        let airlines = board.airlines(NET).unwrap();
        assert_eq!(airlines.len(), 1);
        assert_eq!(airlines[0].length_square(), 1_000_000.0);
        assert!(airlines[0].from_item == c || airlines[0].to_item == c);
    }

    #[test]
    fn test_airlines_out_of_range() {
        let mut board = Board::new("test");
        board.add_pin(NET, TOP, Point::new(1 << 30, 0), 10);
        assert!(matches!(board.airlines(NET), Err(BoardError::Triangulation(_))));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut board = Board::new("test");
        let pin = board.add_pin(NET, TOP, Point::new(5, 5), 2);
        board.add_via(NET, LayerId(1), Point::new(50, 50), 3);
        let json = board.to_json().unwrap();
        let mut loaded = Board::from_json(&json).unwrap();
        assert_eq!(loaded.id, board.id);
        assert_eq!(loaded.item_count(), 2);
        assert_eq!(loaded.overlapping_items(TOP, &probe(5, 5)), BTreeSet::from([pin]));
        let new_id = loaded.add_pin(NET, TOP, Point::new(9, 9), 1);
        assert!(new_id > pin);
        assert!(!loaded.can_undo());
    }
}
