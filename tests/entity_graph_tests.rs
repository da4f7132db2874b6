//! Integration tests for the entity graph
//!
//! These tests verify the behaviour shared by every entity type:
//! - identity mapping across payloads and expiry
//! - dirty tracking against the load-time baseline
//! - inverse relationship sync between resident entities
//! - stubs for references without their label field

use std::collections::HashSet;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use stash_client::entities::{Gallery, Group, GroupDescription, Scene, Studio, Tag};
use stash_client::orm::{Entity, EntityStore, Field, Value};

// ============================================================================
// Identity Map
// ============================================================================

#[test]
fn test_scene_payload_built_twice_shares_instances() {
    let store = EntityStore::default();
    let payload = json!({
        "id": "s1",
        "title": "Movie",
        "studio": { "id": "st1", "name": "Acme" },
        "tags": [{ "id": "t1", "name": "x" }, { "id": "t1", "name": "x" }]
    });

    let first = Scene::from_payload(&payload, &store).unwrap();
    let second = Scene::from_payload(&payload, &store).unwrap();
    assert!(first.ptr_eq(&second));

    let tags = second.tags().into_option().unwrap();
    assert!(tags[0].ptr_eq(&tags[1]));

    let studio = second.studio().into_option().unwrap();
    assert_eq!(studio.name(), Field::Value("Acme".to_string()));
    assert!(studio.ptr_eq(&store.get_typed::<Studio>("st1").unwrap()));
}

#[test]
fn test_expired_entries_are_rebuilt_and_evicted() {
    let store = EntityStore::new(Duration::ZERO);
    let first = Tag::from_payload(&json!({ "id": "t1", "name": "x" }), &store).unwrap();
    let second = Tag::from_payload(&json!({ "id": "t1", "name": "x" }), &store).unwrap();

    assert!(!first.ptr_eq(&second));
    assert!(store.get("Tag", "t1").is_none());
    assert!(store.is_empty());
}

#[test]
fn test_evicted_entity_stays_usable() {
    let store = EntityStore::default();
    let tag = Tag::from_payload(&json!({ "id": "t1", "name": "x" }), &store).unwrap();

    store.clear_type("Tag");
    tag.set_name("still works".to_string());
    assert!(tag.is_dirty());
    assert!(!tag.is_resident());
}

#[tokio::test]
async fn test_concurrent_construction_yields_one_instance() {
    let store = EntityStore::default();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                Tag::from_payload(&json!({ "id": "t1", "name": "x" }), &store).unwrap()
            })
        })
        .collect();

    let mut tags = Vec::new();
    for handle in handles {
        tags.push(handle.await.unwrap());
    }

    let cached = store.get_typed::<Tag>("t1").unwrap();
    assert!(tags.iter().all(|tag| tag.ptr_eq(&cached)));
}

// ============================================================================
// Dirty Tracking
// ============================================================================

#[test]
fn test_dirty_round_trip_on_list_field() {
    let store = EntityStore::default();
    let tag = Tag::from_payload(&json!({ "id": "t1", "name": "x", "aliases": ["a", "b"] }), &store).unwrap();
    assert!(!tag.is_dirty());

    tag.set_aliases(vec!["a".to_string(), "b".to_string()]);
    assert!(!tag.is_dirty(), "an equal list is not a change");

    tag.set_aliases(vec!["b".to_string()]);
    assert!(tag.get_changed_fields().contains_key("aliases"));

    tag.mark_clean();
    assert!(!tag.is_dirty());
}

#[test]
fn test_setting_null_is_a_change() {
    let store = EntityStore::default();
    let scene = Scene::from_payload(
        &json!({ "id": "s1", "title": "A", "studio": { "id": "st1", "name": "Acme" } }),
        &store,
    )
    .unwrap();

    scene.set_studio(Field::Null);
    assert_eq!(scene.get_changed_fields().get("studio"), Some(&Value::Null));
}

// ============================================================================
// Inverse Sync
// ============================================================================

#[test]
fn test_parent_child_sync_converges() {
    let store = EntityStore::default();
    let parent = Tag::from_payload(&json!({ "id": "p", "name": "Parent" }), &store).unwrap();
    let child = Tag::from_payload(&json!({ "id": "c", "name": "Child" }), &store).unwrap();

    child.set_parents(vec![parent.clone()]);
    child.set_parents(vec![parent.clone()]);

    let parents = child.parents().into_option().unwrap();
    let children = parent.children().into_option().unwrap();
    assert_eq!(parents, vec![parent.clone()]);
    assert_eq!(children, vec![child.clone()]);
}

#[test]
fn test_linked_entities_outlive_eviction() {
    let store = EntityStore::default();
    let parent = Tag::from_payload(&json!({ "id": "p", "name": "Parent" }), &store).unwrap();
    let child = Tag::from_payload(&json!({ "id": "c", "name": "Child" }), &store).unwrap();
    child.set_parents(vec![parent.clone()]);
    drop(parent);

    store.clear();

    // The child's handle keeps the parent alive, and the parent points back
    let parent = child.parents().into_option().unwrap().remove(0);
    assert_eq!(parent.name(), Field::Value("Parent".to_string()));
    assert_eq!(parent.children().into_option().unwrap(), vec![child.clone()]);
    assert!(!parent.is_resident());
}

#[test]
fn test_inverse_appends_to_existing_list() {
    let store = EntityStore::default();
    let scene = Scene::from_payload(&json!({ "id": "s1", "title": "A" }), &store).unwrap();
    let other = Scene::from_payload(&json!({ "id": "s2", "title": "B" }), &store).unwrap();
    let gallery = Gallery::from_payload(
        &json!({ "id": "g1", "title": "G", "scenes": [{ "id": "s2", "title": "B" }] }),
        &store,
    )
    .unwrap();

    scene.set_galleries(vec![gallery.clone()]);

    let scenes = gallery.scenes().into_option().unwrap();
    assert_eq!(scenes, vec![other, scene]);
}

#[test]
fn test_single_valued_inverse_reparents() {
    let store = EntityStore::default();
    let parent = Studio::from_payload(&json!({ "id": "st1", "name": "Parent" }), &store).unwrap();
    let child = Studio::from_payload(&json!({ "id": "st2", "name": "Child" }), &store).unwrap();

    parent.set_child_studios(vec![child.clone()]);
    assert_eq!(child.parent_studio().into_option(), Some(parent.clone()));
    assert!(child.get_changed_fields().contains_key("parent_studio"));
}

#[test]
fn test_wrapper_links_do_not_sync() {
    let store = EntityStore::default();
    let group = Group::from_payload(&json!({ "id": "g1", "name": "Outer" }), &store).unwrap();
    let inner = Group::from_payload(&json!({ "id": "g2", "name": "Inner" }), &store).unwrap();

    group.set_sub_groups(vec![GroupDescription::new(inner.clone(), Some("part one".to_string()))]);
    assert!(!inner.containing_groups().is_set());
}

// ============================================================================
// Stubs and Equality
// ============================================================================

#[test]
fn test_reference_without_label_builds_stub() {
    let store = EntityStore::default();
    let scene = Scene::from_payload(&json!({ "id": "s1", "title": "A", "tags": [{ "id": "5" }] }), &store).unwrap();

    let tag = scene.tags().into_option().unwrap().remove(0);
    assert!(tag.is_stub());
    assert_eq!(tag.name(), Field::Value(String::new()));
    assert!(!scene.is_stub());
}

#[test]
fn test_equality_and_hash_use_type_and_id() {
    let a = EntityStore::default();
    let b = EntityStore::default();
    let first = Tag::from_payload(&json!({ "id": "7", "name": "One" }), &a).unwrap();
    let second = Tag::from_payload(&json!({ "id": "7", "name": "Two" }), &b).unwrap();
    let scene = Scene::from_payload(&json!({ "id": "7", "title": "Seven" }), &a).unwrap();

    assert!(!first.ptr_eq(&second));
    assert_eq!(first, second);

    let set: HashSet<Tag> = [first.clone(), second.clone()].into_iter().collect();
    assert_eq!(set.len(), 1);
    assert_ne!(*first.entity_ref(), *scene.entity_ref());
}
