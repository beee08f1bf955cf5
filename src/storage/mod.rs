//! Storage backends for the story graph
//!
//! The pipeline talks to storage through the `GraphStore` trait.
//! The shipped implementation is `SqliteStore`.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    ArcRow, CharacterState, GraphStats, GraphStore, GraphTx, OpenStore, StorageError,
    StorageResult, TimelineScene,
};
