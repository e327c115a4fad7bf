use serde::{Deserialize, Serialize};

use crate::geometry::BoundingDirections;

/// Tuning knobs shared by the search tree, the triangulation and the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreSettings {
    /// Direction family for the bounding shapes of the shape search tree.
    #[serde(default)]
    pub bounding_directions: BoundingDirections,
    /// Seed for shuffling triangulation corners. A fixed seed keeps rats nests reproducible.
    #[serde(default = "default_triangulation_seed")]
    pub triangulation_seed: u64,
    /// Initial capacity of the traversal stack used by overlap queries.
    #[serde(default = "default_tree_stack_capacity")]
    pub tree_stack_capacity: usize,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            bounding_directions: BoundingDirections::default(),
            triangulation_seed: default_triangulation_seed(),
            tree_stack_capacity: default_tree_stack_capacity(),
        }
    }
}

impl CoreSettings {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn default_triangulation_seed() -> u64 {
    99
}

fn default_tree_stack_capacity() -> usize {
    64
}
