//! Identity and serialization tests for the story model

use super::*;
use serde_json::json;

#[test]
fn scene_id_is_composed_from_manuscript_paragraph_and_chunk() {
    let id = SceneId::compose(&ManuscriptId::from("match-girl"), "p7", 2);
    assert_eq!(id.as_str(), "match-girl::p7::2");
}

#[test]
fn scene_id_escapes_separators_in_components() {
    let nested = SceneId::compose(&ManuscriptId::from("a::b"), "c", 0);
    let split = SceneId::compose(&ManuscriptId::from("a"), "b::c", 0);
    assert_ne!(nested, split);
    assert_eq!(nested.as_str(), "a%3A%3Ab::c::0");
    assert_eq!(
        SceneId::compose(&ManuscriptId::from("50%"), "p:1", 3).as_str(),
        "50%25::p%3A1::3"
    );
}

#[test]
fn entity_identity_is_case_folded() {
    let a = NarrativeEntity::Character(Character {
        name: "Little Match Girl".to_string(),
        ..Default::default()
    });
    let b = NarrativeEntity::Location(Location {
        name: "  little match girl ".to_string(),
        location_type: None,
    });
    assert_eq!(a.key(), b.key());
    assert_eq!(a.node_id(), "entity:little match girl");
}

#[test]
fn identical_event_text_in_same_scene_shares_id() {
    let m = ManuscriptId::from("m1");
    let s = SceneId::compose(&m, "p1", 0);
    let first = Event::new(&m, &s, "She lit a match");
    let second = Event::new(&m, &s, "She lit a match");
    assert_eq!(first.id, second.id);

    let other_scene = SceneId::compose(&m, "p1", 1);
    let third = Event::new(&m, &other_scene, "She lit a match");
    assert_ne!(first.id, third.id);
}

#[test]
fn entity_serializes_as_tagged_variant() {
    let entity = NarrativeEntity::Location(Location {
        name: "Street corner".to_string(),
        location_type: Some("urban".to_string()),
    });
    let value = serde_json::to_value(&entity).unwrap();
    assert_eq!(
        value,
        json!({ "kind": "location", "name": "Street corner", "type": "urban" })
    );
}

#[test]
fn relationship_round_trips_through_its_label() {
    for rel in [
        Relationship::Contains,
        Relationship::NextScene,
        Relationship::AppearsIn,
        Relationship::SettingIs,
        Relationship::IncludesEvent,
        Relationship::InteractsWith,
    ] {
        assert_eq!(rel.as_str().parse::<Relationship>().unwrap(), rel);
    }
    assert!("KNOWS".parse::<Relationship>().is_err());
}
