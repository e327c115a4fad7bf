//! # PcbRoute Core
//!
//! Board data structures of the autorouter: a minimal-area-growth shape
//! search tree, an incremental Delaunay triangulation for rats nests, and an
//! object store with undo and redo via per-object version chains.
//!
//! This crate is the heart of the PcbRoute kernel.

pub mod board;
pub mod delaunay;
pub mod error;
pub mod geometry;
pub mod settings;
pub mod shape_tree;
pub mod undo;

pub use board::{AirLine, Board, Item, ItemId, ItemKind, LayerId, NetId};
pub use delaunay::{PlanarDelaunayTriangulation, ResultEdge, TriangulationStorable};
pub use error::{BoardError, TriangulationError, UndoError};
pub use geometry::{BoundingDirections, BoundingShape, IntBox, IntOctagon, Point, TileShape};
pub use settings::CoreSettings;
pub use shape_tree::{LeafId, ShapeTree, TreeEntry, TreeId, TreeStorable};
pub use undo::{Changes, Storable, UndoableObjects};
