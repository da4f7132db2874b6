//! Core traits and per-type schema tables for the entity layer
//!
//! Every entity type carries one static [`EntitySchema`] generated by the
//! `#[entity]` attribute from `stash-macros`. The schema lists the declared
//! fields, which of them are tracked for dirty detection, how each
//! relationship is fetched and written, and the GraphQL operations used to
//! read and persist the type. Nothing here is looked up by reflection; the
//! tables are plain `static` items linked at compile time.

use serde_json::Value as JsonValue;

use super::entity::EntityRef;
use super::store::EntityStore;
use super::value::Value;
use crate::graphql::errors::Result;

/// Converts a related value into its wire-level link payload.
///
/// Used when a link carries more than an id, e.g. an external id mapping
/// (`{endpoint, stash_id}`) or a group membership with a description.
pub type LinkTransform = fn(&Value) -> std::result::Result<JsonValue, String>;

/// Validates a dynamic value against the declared Rust type of a field.
pub type FieldCheck = fn(&Value) -> std::result::Result<(), String>;

/// Static description of one entity type.
#[derive(Debug)]
pub struct EntitySchema {
    /// GraphQL type name (e.g., "Tag")
    pub type_name: &'static str,
    /// Required display field; stubs get an empty placeholder for it
    pub label_field: Option<&'static str>,
    /// Declared fields, excluding `id`
    pub fields: &'static [FieldDef],
    /// Relationship metadata keyed by field name
    pub relationships: &'static [RelationshipMetadata],
    /// GraphQL operations for this type
    pub operations: Operations,
}

impl EntitySchema {
    /// Look up a declared field.
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Look up the relationship declared on a field.
    pub fn relationship(&self, field: &str) -> Option<&'static RelationshipMetadata> {
        self.relationships.iter().find(|r| r.field == field)
    }

    /// Names of the fields that participate in dirty tracking.
    pub fn tracked_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.tracked).map(|f| f.name)
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        self.field(name).is_some_and(|f| f.tracked)
    }
}

/// One declared field.
#[derive(Debug)]
pub struct FieldDef {
    /// GraphQL field name
    pub name: &'static str,
    pub kind: FieldKind,
    /// Participates in dirty tracking and save payloads
    pub tracked: bool,
    /// Sub-selection for object-valued scalars or extra wrapper keys
    pub selection: Option<&'static str>,
    /// Type check for values assigned dynamically or decoded from payloads
    pub check: FieldCheck,
}

/// Shape of a declared field.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Scalar, scalar list or plain object; stored as JSON
    Scalar,
    /// Reference to one entity or an ordered list of them
    Entity {
        target: fn() -> &'static EntitySchema,
        list: bool,
    },
    /// Wrapper objects holding an entity under the `via` key
    Complex {
        target: fn() -> &'static EntitySchema,
        via: &'static str,
        list: bool,
    },
}

impl FieldKind {
    pub fn is_list(&self) -> bool {
        match self {
            FieldKind::Scalar => false,
            FieldKind::Entity { list, .. } | FieldKind::Complex { list, .. } => *list,
        }
    }

    /// Schema of the related entity type, if this field links to one.
    pub fn target(&self) -> Option<&'static EntitySchema> {
        match self {
            FieldKind::Scalar => None,
            FieldKind::Entity { target, .. } | FieldKind::Complex { target, .. } => Some(target()),
        }
    }
}

/// How a relationship field is fetched.
#[derive(Debug, Clone, Copy)]
pub enum FetchStrategy {
    /// Nested selection on the owning object
    DirectField,
    /// Secondary list query filtered by the owner's id
    FilterQuery(FilterQuery),
    /// Wrapper objects carrying the entity plus link data
    ComplexObject,
}

/// A secondary query that resolves a relationship, e.g.
/// `findScenes(scene_filter: { tags: { value: [$id], modifier: INCLUDES } })`.
#[derive(Debug, Clone, Copy)]
pub struct FilterQuery {
    pub query: &'static str,
    pub filter_arg: &'static str,
    pub filter_field: &'static str,
    pub result_field: &'static str,
}

/// The reverse side of a bidirectional edge.
#[derive(Debug, Clone, Copy)]
pub struct InverseEdge {
    pub type_name: &'static str,
    pub field: &'static str,
}

/// Declarative description of one relationship edge.
#[derive(Debug)]
pub struct RelationshipMetadata {
    /// Field on the entity holding the relationship
    pub field: &'static str,
    /// Key used in create/update input payloads (e.g., "tag_ids")
    pub target_field: &'static str,
    pub list: bool,
    pub strategy: FetchStrategy,
    pub inverse: Option<InverseEdge>,
    pub transform: Option<LinkTransform>,
    pub auto_sync: bool,
}

/// GraphQL operation names for an entity type.
#[derive(Debug)]
pub struct Operations {
    /// Single-object lookup (e.g., "findTag")
    pub find: &'static str,
    /// Lookup takes `input: { id }` instead of `id`
    pub find_by_input: bool,
    /// List query (e.g., "findTags")
    pub list: Option<&'static str>,
    /// Key of the entity list in the list query result (e.g., "tags")
    pub list_key: Option<&'static str>,
    /// Name of the type-specific filter argument (e.g., "tag_filter")
    pub list_filter: Option<&'static str>,
    /// GraphQL type of that argument (e.g., "TagFilterType")
    pub list_filter_type: Option<&'static str>,
    pub create: Option<&'static str>,
    pub create_input: Option<&'static str>,
    pub update: Option<&'static str>,
    pub update_input: Option<&'static str>,
    pub destroy: Option<&'static str>,
    pub destroy_input: Option<&'static str>,
}

/// A typed entity wrapper around a shared [`EntityRef`].
///
/// Implemented by the `#[entity]` attribute macro.
pub trait Entity: Sized + Clone + Send + Sync + 'static {
    /// GraphQL type name
    const TYPE_NAME: &'static str;

    fn schema() -> &'static EntitySchema;

    /// Wrap a handle. The handle must belong to this type.
    fn from_ref(entity: EntityRef) -> Self;

    fn entity_ref(&self) -> &EntityRef;

    /// Wrap a handle after checking its type.
    fn try_from_ref(entity: EntityRef) -> Option<Self> {
        (entity.type_name() == Self::TYPE_NAME).then(|| Self::from_ref(entity))
    }

    /// Build (or resolve through the identity map) from a server payload.
    fn from_payload(raw: &JsonValue, store: &EntityStore) -> Result<Self> {
        super::construct::from_server_payload(Self::schema(), raw, store).map(Self::from_ref)
    }
}

/// Conversion between a Rust field type and a dynamic [`Value`].
///
/// `from_value` only ever sees set, non-null values.
pub trait FieldType: Sized {
    fn from_value(value: &Value) -> std::result::Result<Self, String>;

    fn into_value(self) -> Value;
}

/// Type check used by [`FieldDef::check`]. Unset and null pass for every type.
pub fn check_value<T: FieldType>(value: &Value) -> std::result::Result<(), String> {
    match value {
        Value::Unset | Value::Null => Ok(()),
        other => T::from_value(other).map(|_| ()),
    }
}

/// Extract an entity handle of the given type from a value.
pub fn entity_from_value(value: &Value, type_name: &str) -> std::result::Result<EntityRef, String> {
    match value {
        Value::Entity(entity) if entity.type_name() == type_name => Ok(entity.clone()),
        Value::Entity(entity) => Err(format!(
            "expected {} reference, found {}",
            type_name,
            entity.type_name()
        )),
        other => Err(format!("expected {} reference, found {}", type_name, other.kind())),
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn from_value(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::List(_) | Value::Json(JsonValue::Array(_)) => value
                .elements()
                .iter()
                .map(|item| T::from_value(item))
                .collect(),
            other => Err(format!("expected a list, found {}", other.kind())),
        }
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(FieldType::into_value).collect())
    }
}

/// Implement [`FieldType`] for serde types stored as plain JSON.
macro_rules! json_field_type {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::graphql::orm::FieldType for $ty {
                fn from_value(
                    value: &$crate::graphql::orm::Value,
                ) -> ::std::result::Result<Self, String> {
                    match value {
                        $crate::graphql::orm::Value::Json(json) => {
                            ::serde_json::from_value(json.clone()).map_err(|e| e.to_string())
                        }
                        other => Err(format!(
                            "expected {}, found {}",
                            stringify!($ty),
                            other.kind()
                        )),
                    }
                }

                fn into_value(self) -> $crate::graphql::orm::Value {
                    ::serde_json::to_value(self)
                        .map($crate::graphql::orm::Value::from_json)
                        .unwrap_or($crate::graphql::orm::Value::Null)
                }
            }
        )+
    };
}

pub(crate) use json_field_type;

json_field_type!(String, bool, i32, i64, u32, u64, f64, JsonValue);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_field_types() {
        assert_eq!(String::from_value(&Value::Json(json!("a"))), Ok("a".to_string()));
        assert_eq!(i32::from_value(&Value::Json(json!(7))), Ok(7));
        assert_eq!(f64::from_value(&Value::Json(json!(3))), Ok(3.0));
        assert!(i32::from_value(&Value::Json(json!("seven"))).is_err());
        assert!(String::from_value(&Value::List(Vec::new())).is_err());
    }

    #[test]
    fn test_vec_accepts_both_list_forms() {
        let from_json = Vec::<String>::from_value(&Value::Json(json!(["a", "b"])));
        let from_list = Vec::<String>::from_value(&Value::List(vec![Value::Json(json!("a"))]));
        assert_eq!(from_json, Ok(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(from_list, Ok(vec!["a".to_string()]));
        assert!(Vec::<String>::from_value(&Value::Json(json!("a"))).is_err());
    }

    #[test]
    fn test_check_value_passes_unset_and_null() {
        assert!(check_value::<i32>(&Value::Unset).is_ok());
        assert!(check_value::<i32>(&Value::Null).is_ok());
        assert!(check_value::<i32>(&Value::Json(json!([1]))).is_err());
    }
}
