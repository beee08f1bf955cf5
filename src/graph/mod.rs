//! Story graph data model

mod edge;
mod node;

#[cfg(test)]
mod tests;

pub use edge::{Edge, Relationship};
pub use node::{
    entity_node_id, fold_name, Character, Event, Location, ManuscriptId, NarrativeEntity, Scene,
    SceneId,
};
