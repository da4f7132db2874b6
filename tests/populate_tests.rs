//! Integration tests for selective population
//!
//! These tests verify that populate:
//! - fetches nothing when every requested path is already loaded
//! - fetches only the missing paths, in exactly one request
//! - merges without disturbing the tracking state of other fields
//! - leaves the entity untouched when the fetch fails

mod common;

use std::collections::BTreeSet;

use assert_matches::assert_matches;
use common::{connection_error, mock_client};
use pretty_assertions::assert_eq;
use serde_json::json;
use stash_client::entities::{Scene, Studio, Tag};
use stash_client::orm::{Entity, Field, missing_fields, populate};
use stash_client::{StashClient, StashError};

fn loaded_scene(client: &StashClient) -> Scene {
    Scene::from_payload(&json!({ "id": "s1", "title": "Movie" }), client.store()).unwrap()
}

// ============================================================================
// Fetch Avoidance
// ============================================================================

#[tokio::test]
async fn test_known_fields_issue_no_fetch() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);
    assert_eq!(
        scene.received_fields(),
        BTreeSet::from(["id".to_string(), "title".to_string()])
    );

    client.populate(&scene, ["title"], false).await.unwrap();
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn test_only_missing_fields_are_requested() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);

    transport.respond(json!({
        "entity": { "id": "s1", "tags": [{ "id": "t1", "name": "x" }] }
    }));

    client.populate(&scene, ["title", "tags"], false).await.unwrap();

    assert_eq!(transport.request_count(), 1);
    let request = transport.last_request();
    assert_eq!(
        request.query,
        "query PopulateScene($id: ID!) { entity: findScene(id: $id) { id tags { id name } } }"
    );
    assert_eq!(request.variables.get("id"), Some(&json!("s1")));

    let tags = scene.tags().into_option().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name(), Field::Value("x".to_string()));
    assert!(scene.has_fields(&["tags"]));
    assert!(!scene.is_dirty());

    // Now everything is known
    client.populate(&scene, ["title", "tags"], false).await.unwrap();
    assert_eq!(transport.request_count(), 1);
}

#[tokio::test]
async fn test_nested_paths_share_one_request() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);

    transport.respond(json!({
        "entity": {
            "id": "s1",
            "files": [{ "id": "f1", "path": "/a.mp4", "size": 10 }],
            "studio": { "id": "st1", "name": "Acme" }
        }
    }));

    client
        .populate(&scene, ["files.path", "files__size", "studio"], false)
        .await
        .unwrap();

    assert_eq!(transport.request_count(), 1);
    assert_eq!(
        transport.last_request().query,
        "query PopulateScene($id: ID!) { entity: findScene(id: $id) { id files { id path size } studio { id name } } }"
    );
    assert!(missing_fields(&scene, ["files.size", "studio.name"]).is_empty());
}

#[tokio::test]
async fn test_force_refetch_requests_known_fields() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);

    transport.respond(json!({ "entity": { "id": "s1", "title": "Renamed on server" } }));
    client.populate(&scene, ["title"], true).await.unwrap();

    assert_eq!(transport.request_count(), 1);
    assert_eq!(scene.title(), Field::Value("Renamed on server".to_string()));
    assert!(!scene.is_dirty());
}

#[tokio::test]
async fn test_filtered_relationship_in_same_request() {
    let (client, transport) = mock_client();
    let tag = Tag::from_payload(&json!({ "id": "t1", "name": "x" }), client.store()).unwrap();

    transport.respond(json!({
        "entity": { "id": "t1", "description": "desc" },
        "rel_scenes": { "scenes": [{ "id": "s1", "title": "Movie" }] }
    }));

    client
        .populate(&tag, ["scenes", "description"], false)
        .await
        .unwrap();

    assert_eq!(transport.request_count(), 1);
    let query = transport.last_request().query;
    assert!(query.contains("entity: findTag(id: $id) { id description }"));
    assert!(query.contains("rel_scenes: findScenes(scene_filter: { tags: { value: [$id], modifier: INCLUDES } }"));

    let scenes = tag.scenes().into_option().unwrap();
    assert_eq!(scenes.len(), 1);
    let cached: Scene = client.store().get_typed("s1").unwrap();
    assert!(scenes[0].ptr_eq(&cached));
    assert_eq!(tag.description(), Field::Value("desc".to_string()));
}

// ============================================================================
// Tracking State
// ============================================================================

#[tokio::test]
async fn test_merge_preserves_unrelated_local_edits() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);
    scene.set_title("Local edit".to_string());

    transport.respond(json!({ "entity": { "id": "s1", "details": "From server" } }));
    client.populate(&scene, ["details"], false).await.unwrap();

    let changed = scene.get_changed_fields();
    assert_eq!(changed.keys().copied().collect::<Vec<_>>(), vec!["title"]);
    assert_eq!(scene.title(), Field::Value("Local edit".to_string()));
    assert_eq!(scene.details(), Field::Value("From server".to_string()));
}

#[tokio::test]
async fn test_nested_objects_resolve_through_identity_map() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);
    let tag = Tag::from_payload(&json!({ "id": "t1", "name": "x" }), client.store()).unwrap();

    transport.respond(json!({
        "entity": { "id": "s1", "tags": [{ "id": "t1", "name": "x" }] }
    }));
    client.populate(&scene, ["tags"], false).await.unwrap();

    let tags = scene.tags().into_option().unwrap();
    assert!(tags[0].ptr_eq(&tag));
}

#[tokio::test]
async fn test_nested_hit_keeps_unsaved_edits() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);
    let tag = Tag::from_payload(&json!({ "id": "t1", "name": "x" }), client.store()).unwrap();
    tag.set_name("local edit".to_string());

    transport.respond(json!({
        "entity": { "id": "s1", "tags": [{ "id": "t1", "name": "x", "description": "d" }] }
    }));
    client.populate(&scene, ["tags"], false).await.unwrap();

    assert_eq!(tag.name(), Field::Value("local edit".to_string()));
    assert_eq!(tag.description(), Field::Value("d".to_string()));
    assert_eq!(tag.get_changed_fields().keys().copied().collect::<Vec<_>>(), vec!["name"]);
}

#[tokio::test]
async fn test_forced_refetch_keeps_edits_on_related_entities() {
    let (client, transport) = mock_client();
    let scene = Scene::from_payload(
        &json!({ "id": "s1", "title": "Movie", "studio": { "id": "st1", "name": "Old" } }),
        client.store(),
    )
    .unwrap();
    let studio = scene.studio().into_option().unwrap();
    studio.set_name("Renamed".to_string());

    transport.respond(json!({
        "entity": { "id": "s1", "title": "Server title", "studio": { "id": "st1", "name": "Old" } }
    }));
    client.populate(&scene, ["title", "studio"], true).await.unwrap();

    assert_eq!(scene.title(), Field::Value("Server title".to_string()));
    assert_eq!(studio.name(), Field::Value("Renamed".to_string()));
    assert!(studio.is_dirty());
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test]
async fn test_transport_failure_leaves_entity_untouched() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);
    scene.set_title("Local edit".to_string());
    let received = scene.received_fields();

    transport.fail(connection_error());
    let result = client.populate(&scene, ["tags"], false).await;

    assert_matches!(result, Err(StashError::Connection { .. }));
    assert_eq!(scene.received_fields(), received);
    assert!(!scene.tags().is_set());
    assert_eq!(scene.get_changed_fields().keys().copied().collect::<Vec<_>>(), vec!["title"]);
}

#[tokio::test]
async fn test_bad_payload_merges_nothing() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);

    // details is valid, tags has the wrong cardinality
    transport.respond(json!({
        "entity": { "id": "s1", "details": "d", "tags": { "id": "t1" } }
    }));
    let result = client.populate(&scene, ["details", "tags"], false).await;

    assert_matches!(result, Err(StashError::Construction { .. }));
    assert!(!scene.details().is_set());
    assert!(!scene.has_fields(&["details"]));
}

#[tokio::test]
async fn test_bad_payload_leaves_related_entities_untouched() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);
    let studio = Studio::from_payload(&json!({ "id": "st1", "name": "Old" }), client.store()).unwrap();

    // studio and tags convert, performers has the wrong cardinality
    transport.respond(json!({
        "entity": {
            "id": "s1",
            "studio": { "id": "st1", "name": "New", "details": "From server" },
            "tags": [{ "id": "t9", "name": "Fresh" }],
            "performers": { "id": "p1" }
        }
    }));
    let result = client.populate(&scene, ["studio", "tags", "performers"], false).await;

    assert_matches!(result, Err(StashError::Construction { field, .. }) if field == "performers");
    assert_eq!(studio.name(), Field::Value("Old".to_string()));
    assert!(!studio.details().is_set());
    assert!(!studio.has_fields(&["details"]));
    assert!(!client.store().contains("Tag", "t9"));
    assert!(!scene.studio().is_set());
    assert!(!scene.has_fields(&["studio"]));
}

#[tokio::test]
async fn test_missing_entity_is_not_found() {
    let (client, transport) = mock_client();
    let scene = loaded_scene(&client);

    transport.respond(json!({ "entity": null }));
    let result = client.populate(&scene, ["tags"], false).await;
    assert_matches!(result, Err(StashError::NotFound { .. }));
}

#[tokio::test]
async fn test_unsaved_entity_cannot_be_populated() {
    let (client, transport) = mock_client();
    let scene = Scene::new();

    let result = populate(scene.entity_ref(), ["tags"], &client, false).await;
    assert_matches!(result, Err(StashError::NotFound { .. }));
    assert_eq!(transport.request_count(), 0);
}
