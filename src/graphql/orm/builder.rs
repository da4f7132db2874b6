//! GraphQL document builder for entity types
//!
//! Builds the selection sets and operation documents used to read and
//! persist entities. Selections come from the static schema tables:
//!
//! - scalar fields are selected by name (plus their declared sub-selection
//!   for object-valued scalars such as `paths`)
//! - entity references always select `id` and the target's label field, so
//!   nested objects arrive complete enough to never become stubs
//! - wrapper fields select the wrapped entity under its `via` key plus the
//!   declared extra keys
//! - fields resolved through a secondary filtered query are left out of the
//!   default selection and become aliased root fields when requested

use std::collections::BTreeMap;

use super::traits::{EntitySchema, FetchStrategy, FieldKind, FilterQuery};
use crate::graphql::errors::{Result, StashError};

/// Tree of requested field paths (`files.path` → `files { path }`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    children: BTreeMap<String, Selection>,
}

impl Selection {
    /// Build a tree from dotted (or double-underscore) paths.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut root = Selection::default();
        for path in paths {
            root.insert(&normalize_path(path.as_ref()));
        }
        root
    }

    fn insert(&mut self, path: &str) {
        let mut node = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            node = node.children.entry(segment.to_string()).or_default();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Selection> {
        self.children.get(name)
    }

    /// Top-level field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Top-level entries with their sub-trees.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &Selection)> {
        self.children.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Split into the part fetched on the object itself and the fields
    /// resolved through filtered queries.
    pub(crate) fn partition<'s>(
        &'s self,
        schema: &EntitySchema,
    ) -> (Selection, Vec<(&'s str, FilterQuery, &'s Selection)>) {
        let mut direct = Selection::default();
        let mut filtered = Vec::new();

        for (name, sub) in self.entries() {
            match schema.relationship(name).map(|r| r.strategy) {
                Some(FetchStrategy::FilterQuery(query)) => filtered.push((name, query, sub)),
                _ => {
                    direct.children.insert(name.to_string(), sub.clone());
                }
            }
        }

        (direct, filtered)
    }

    fn render_raw(&self) -> String {
        self.children
            .iter()
            .map(|(name, sub)| {
                if sub.is_empty() {
                    name.clone()
                } else {
                    format!("{} {{ {} }}", name, sub.render_raw())
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// `files__path` and `files.path` name the same path.
pub fn normalize_path(path: &str) -> String {
    path.trim().replace("__", ".")
}

/// Selection of every field fetched with the object itself.
pub fn default_selection(schema: &EntitySchema) -> String {
    let mut parts = vec!["id".to_string()];
    for def in schema.fields {
        let filtered = matches!(
            schema.relationship(def.name).map(|r| r.strategy),
            Some(FetchStrategy::FilterQuery(_))
        );
        if filtered {
            continue;
        }
        // Declared fields always render
        if let Ok(field) = render_field(schema, def.name, &Selection::default()) {
            parts.push(field);
        }
    }
    parts.join(" ")
}

/// Render an explicit selection against a schema, always including `id`.
pub fn render_selection(schema: &EntitySchema, selection: &Selection) -> Result<String> {
    let mut parts = vec!["id".to_string()];
    for (name, sub) in selection.entries() {
        if name == "id" {
            continue;
        }
        parts.push(render_field(schema, name, sub)?);
    }
    Ok(parts.join(" "))
}

fn render_field(schema: &EntitySchema, name: &str, sub: &Selection) -> Result<String> {
    let def = schema.field(name).ok_or_else(|| StashError::UnknownField {
        type_name: schema.type_name.to_string(),
        field: name.to_string(),
    })?;

    let rendered = match def.kind {
        FieldKind::Scalar => {
            if !sub.is_empty() {
                format!("{} {{ {} }}", name, sub.render_raw())
            } else if let Some(selection) = def.selection {
                format!("{} {{ {} }}", name, selection)
            } else {
                name.to_string()
            }
        }
        FieldKind::Entity { target, .. } => {
            format!("{} {{ {} }}", name, reference_selection(target(), sub)?)
        }
        FieldKind::Complex { target, via, .. } => {
            let empty = Selection::default();
            let inner = sub.get(via).unwrap_or(&empty);
            let mut parts = vec![format!("{} {{ {} }}", via, reference_selection(target(), inner)?)];

            if let Some(extra) = def.selection {
                parts.push(extra.to_string());
            }
            for (key, grand) in sub.entries() {
                let declared = def
                    .selection
                    .is_some_and(|extra| extra.split_whitespace().any(|k| k == key));
                if key == via || declared {
                    continue;
                }
                if grand.is_empty() {
                    parts.push(key.to_string());
                } else {
                    parts.push(format!("{} {{ {} }}", key, grand.render_raw()));
                }
            }

            format!("{} {{ {} }}", name, parts.join(" "))
        }
    };

    Ok(rendered)
}

/// `id`, the label field, and any requested sub-fields of a related entity.
fn reference_selection(target: &EntitySchema, sub: &Selection) -> Result<String> {
    let mut parts = vec!["id".to_string()];
    if let Some(label) = target.label_field {
        if !sub.contains(label) {
            parts.push(label.to_string());
        }
    }
    for (name, grand) in sub.entries() {
        if name == "id" {
            continue;
        }
        parts.push(render_field(target, name, grand)?);
    }
    Ok(parts.join(" "))
}

/// `findTag` → `FindTag`, used as the operation name.
pub fn operation_name(operation: &str) -> String {
    let mut chars = operation.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn find_call(schema: &EntitySchema) -> String {
    let ops = &schema.operations;
    if ops.find_by_input {
        format!("{}(input: {{ id: $id }})", ops.find)
    } else {
        format!("{}(id: $id)", ops.find)
    }
}

/// Single-object lookup by id with the default selection.
pub fn find_document(schema: &EntitySchema) -> String {
    format!(
        "query {}($id: ID!) {{ {} {{ {} }} }}",
        operation_name(schema.operations.find),
        find_call(schema),
        default_selection(schema)
    )
}

/// Alias of the root field carrying the object in a populate document.
pub(crate) const ENTITY_ALIAS: &str = "entity";

/// Alias of the root field resolving a filtered relationship.
pub(crate) fn relation_alias(field: &str) -> String {
    format!("rel_{}", field)
}

/// One request fetching the direct selection plus every filtered relationship.
pub fn populate_document(schema: &EntitySchema, selection: &Selection) -> Result<String> {
    let (direct, filtered) = selection.partition(schema);

    let mut roots = vec![format!(
        "{}: {} {{ {} }}",
        ENTITY_ALIAS,
        find_call(schema),
        render_selection(schema, &direct)?
    )];

    for (field, query, sub) in filtered {
        let target = schema
            .field(field)
            .and_then(|def| def.kind.target())
            .ok_or_else(|| StashError::UnknownField {
                type_name: schema.type_name.to_string(),
                field: field.to_string(),
            })?;

        roots.push(format!(
            "{}: {}({}: {{ {}: {{ value: [$id], modifier: INCLUDES }} }}, filter: {{ per_page: -1 }}) {{ {} {{ {} }} }}",
            relation_alias(field),
            query.query,
            query.filter_arg,
            query.filter_field,
            query.result_field,
            reference_selection(target, sub)?
        ));
    }

    Ok(format!(
        "query Populate{}($id: ID!) {{ {} }}",
        schema.type_name,
        roots.join(" ")
    ))
}

/// Paged list query with the default selection.
pub fn list_document(schema: &EntitySchema) -> Result<String> {
    let ops = &schema.operations;
    let (Some(list), Some(list_key)) = (ops.list, ops.list_key) else {
        return Err(unsupported(schema, "list queries"));
    };

    let (variables, arguments) = match (ops.list_filter, ops.list_filter_type) {
        (Some(arg), Some(ty)) => (
            format!("$filter: FindFilterType, $entity_filter: {}", ty),
            format!("filter: $filter, {}: $entity_filter", arg),
        ),
        _ => (
            "$filter: FindFilterType".to_string(),
            "filter: $filter".to_string(),
        ),
    };

    Ok(format!(
        "query {}({}) {{ {}({}) {{ count {} {{ {} }} }} }}",
        operation_name(list),
        variables,
        list,
        arguments,
        list_key,
        default_selection(schema)
    ))
}

/// Create or update mutation returning the saved fields.
pub fn save_document<'a>(
    schema: &EntitySchema,
    create: bool,
    fields: impl IntoIterator<Item = &'a str>,
) -> Result<(String, &'static str)> {
    let ops = &schema.operations;
    let (operation, input_type) = if create {
        (ops.create, ops.create_input)
    } else {
        (ops.update, ops.update_input)
    };
    let (Some(operation), Some(input_type)) = (operation, input_type) else {
        return Err(unsupported(schema, if create { "create" } else { "update" }));
    };

    let selection = Selection::from_paths(fields);
    let document = format!(
        "mutation {}($input: {}!) {{ {}(input: $input) {{ {} }} }}",
        operation_name(operation),
        input_type,
        operation,
        render_selection(schema, &selection)?
    );

    Ok((document, operation))
}

/// Destroy mutation taking the id as its only input.
pub fn destroy_document(schema: &EntitySchema) -> Result<(String, &'static str)> {
    let ops = &schema.operations;
    let (Some(operation), Some(input_type)) = (ops.destroy, ops.destroy_input) else {
        return Err(unsupported(schema, "destroy"));
    };

    let document = format!(
        "mutation {}($input: {}!) {{ {}(input: $input) }}",
        operation_name(operation),
        input_type,
        operation
    );

    Ok((document, operation))
}

fn unsupported(schema: &EntitySchema, operation: &'static str) -> StashError {
    StashError::Unsupported {
        type_name: schema.type_name.to_string(),
        operation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::entities::{Job, Performer, Scene, Tag, VideoFile};
    use crate::graphql::orm::Entity;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_selection_from_mixed_paths() {
        let selection = Selection::from_paths(["files.path", "files__size", "title"]);
        let files = selection.get("files").unwrap();
        assert!(files.contains("path"));
        assert!(files.contains("size"));
        assert!(selection.contains("title"));
        assert_eq!(selection.fields().collect::<Vec<_>>(), vec!["files", "title"]);
    }

    #[test]
    fn test_render_nested_entity_selection() {
        let selection = Selection::from_paths(["files.path", "studio"]);
        let rendered = render_selection(Scene::schema(), &selection).unwrap();
        assert_eq!(rendered, "id files { id path } studio { id name }");
    }

    #[test]
    fn test_render_complex_selection() {
        let selection = Selection::from_paths(["groups"]);
        let rendered = render_selection(Scene::schema(), &selection).unwrap();
        assert_eq!(rendered, "id groups { group { id name } scene_index }");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let selection = Selection::from_paths(["nope"]);
        assert_matches!(
            render_selection(Tag::schema(), &selection),
            Err(StashError::UnknownField { .. })
        );
    }

    #[test]
    fn test_default_selection_skips_filtered_relationships() {
        let selection = default_selection(Performer::schema());
        assert!(selection.starts_with("id name "));
        assert!(selection.contains("tags { id name }"));
        assert!(selection.contains("stash_ids { endpoint stash_id updated_at }"));
        assert!(!selection.contains("scenes"));
    }

    #[test]
    fn test_populate_document_aliases_filtered_relationships() {
        let selection = Selection::from_paths(["scenes", "aliases"]);
        let document = populate_document(Tag::schema(), &selection).unwrap();

        assert!(document.starts_with("query PopulateTag($id: ID!) { entity: findTag(id: $id) { id"));
        assert!(document.contains(
            "rel_scenes: findScenes(scene_filter: { tags: { value: [$id], modifier: INCLUDES } }, filter: { per_page: -1 }) { scenes { id title } }"
        ));
    }

    #[test]
    fn test_find_document_by_input() {
        let document = find_document(Job::schema());
        assert!(document.starts_with("query FindJob($id: ID!) { findJob(input: { id: $id }) {"));
    }

    #[test]
    fn test_read_only_types_cannot_be_saved() {
        assert_matches!(
            save_document(VideoFile::schema(), false, ["path"]),
            Err(StashError::Unsupported { .. })
        );
        assert_matches!(destroy_document(Job::schema()), Err(StashError::Unsupported { .. }));
    }

    #[test]
    fn test_save_document_selects_saved_fields() {
        let (document, operation) = save_document(Tag::schema(), false, ["name", "parents"]).unwrap();
        assert_eq!(operation, "tagUpdate");
        assert_eq!(
            document,
            "mutation TagUpdate($input: TagUpdateInput!) { tagUpdate(input: $input) { id name parents { id name } } }"
        );
    }

    #[test]
    fn test_list_document() {
        let document = list_document(Tag::schema()).unwrap();
        assert!(document.starts_with(
            "query FindTags($filter: FindFilterType, $entity_filter: TagFilterType) { findTags(filter: $filter, tag_filter: $entity_filter) { count tags { id name"
        ));
    }

    #[test]
    fn test_operation_name() {
        assert_eq!(operation_name("findSceneMarkers"), "FindSceneMarkers");
        assert_eq!(operation_name(""), "");
    }
}
