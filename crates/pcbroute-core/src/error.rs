use thiserror::Error;

use crate::board::ItemId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriangulationError {
    #[error("Triangulation corner ({x}, {y}) lies outside the supported range of +/-{limit}")]
    CornerOutOfRange { x: i64, y: i64, limit: i64 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UndoError {
    #[error("Object {0} is not stored at the current undo level")]
    UnknownObject(String),
}

#[derive(Error, Debug)]
pub enum BoardError {
    #[error("Item {0:?} not found on the board")]
    UnknownItem(ItemId),

    #[error(transparent)]
    Triangulation(#[from] TriangulationError),

    #[error(transparent)]
    Undo(#[from] UndoError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
