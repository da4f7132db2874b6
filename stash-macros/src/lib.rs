//! Procedural macros for the Stash client
//!
//! This crate provides the `#[entity]` attribute used by every entity type:
//!
//! - turns a plain field list into a shared-handle wrapper type
//! - emits the static schema table (fields, relationships, operations)
//! - generates typed three-state getters and setters

use convert_case::{Case, Casing};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::meta::ParseNestedMeta;
use syn::{
    parse_macro_input, Attribute, Fields, GenericArgument, Ident, ItemStruct, LitBool, LitStr,
    Path, PathArguments, Type,
};

/// Declare an entity type backed by the shared entity layer.
///
/// # Usage
///
/// ```ignore
/// #[entity(name = "Tag", label = "name", plural = "Tags")]
/// pub struct Tag {
///     #[field(tracked)]
///     pub name: String,
///
///     #[field(tracked)]
///     pub aliases: Vec<String>,
///
///     #[relation(to = "parent_ids", inverse = "children")]
///     pub parents: Vec<Tag>,
///
///     #[relation(query = "findScenes", filter_arg = "scene_filter", filter_field = "tags", result = "scenes")]
///     pub scenes: Vec<Scene>,
/// }
/// ```
///
/// # Entity arguments
///
/// - `name`: GraphQL type name (defaults to the struct name)
/// - `label`: required display field; payloads without it build stubs
/// - `plural`: enables list queries (`find{plural}`)
/// - `find`: single-object query (defaults to `find{name}`)
/// - `find_input`: the find query takes `input: { id }`
/// - `no_create`, `no_destroy`, `read_only`: drop mutations
///
/// # Field arguments
///
/// - `#[field(tracked)]`: participates in dirty tracking and save payloads
/// - `#[field(rename = "subTasks")]`: GraphQL name differs from the Rust name
/// - `#[field(select = "a b")]`: sub-selection for object-valued scalars
///
/// # Relation arguments
///
/// - `target = "Group"`: related type when the field type is a wrapper
/// - `to = "tag_ids"`: input key; makes the relationship tracked
/// - `inverse = "children"`: field kept in sync on the related side
/// - `via = "group"`: wrapper objects carry the entity under this key
/// - `query`, `filter_arg`, `filter_field`, `result`: resolve through a
///   filtered list query instead of a nested selection
/// - `transform = "path::to::fn"`: converts a link into its input payload
/// - `auto_sync = false`: disables inverse propagation
#[proc_macro_attribute]
pub fn entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = EntityArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);

    let input = parse_macro_input!(item as ItemStruct);

    match expand_entity(args, input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct EntityArgs {
    name: Option<LitStr>,
    label: Option<LitStr>,
    plural: Option<LitStr>,
    find: Option<LitStr>,
    find_input: bool,
    no_create: bool,
    no_destroy: bool,
    read_only: bool,
}

impl EntityArgs {
    fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("name") {
            self.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("label") {
            self.label = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("plural") {
            self.plural = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("find") {
            self.find = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("find_input") {
            self.find_input = true;
        } else if meta.path.is_ident("no_create") {
            self.no_create = true;
        } else if meta.path.is_ident("no_destroy") {
            self.no_destroy = true;
        } else if meta.path.is_ident("read_only") {
            self.read_only = true;
        } else {
            return Err(meta.error("unsupported entity argument"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct FieldArgs {
    tracked: bool,
    rename: Option<LitStr>,
    select: Option<LitStr>,
}

impl FieldArgs {
    fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        if meta.path.is_ident("tracked") {
            self.tracked = true;
        } else if meta.path.is_ident("rename") {
            self.rename = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("select") {
            self.select = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error("unsupported field argument"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct RelationArgs {
    target: Option<LitStr>,
    to: Option<LitStr>,
    inverse: Option<LitStr>,
    via: Option<LitStr>,
    query: Option<LitStr>,
    filter_arg: Option<LitStr>,
    filter_field: Option<LitStr>,
    result: Option<LitStr>,
    transform: Option<LitStr>,
    auto_sync: Option<bool>,
}

impl RelationArgs {
    fn parse(&mut self, meta: ParseNestedMeta) -> syn::Result<()> {
        let slot = if meta.path.is_ident("target") {
            &mut self.target
        } else if meta.path.is_ident("to") {
            &mut self.to
        } else if meta.path.is_ident("inverse") {
            &mut self.inverse
        } else if meta.path.is_ident("via") {
            &mut self.via
        } else if meta.path.is_ident("query") {
            &mut self.query
        } else if meta.path.is_ident("filter_arg") {
            &mut self.filter_arg
        } else if meta.path.is_ident("filter_field") {
            &mut self.filter_field
        } else if meta.path.is_ident("result") {
            &mut self.result
        } else if meta.path.is_ident("transform") {
            &mut self.transform
        } else if meta.path.is_ident("auto_sync") {
            let value: LitBool = meta.value()?.parse()?;
            self.auto_sync = Some(value.value);
            return Ok(());
        } else {
            return Err(meta.error("unsupported relation argument"));
        };

        *slot = Some(meta.value()?.parse()?);
        Ok(())
    }
}

/// One declared field after attribute parsing
struct FieldSpec {
    ident: Ident,
    graphql_name: String,
    ty: Type,
    docs: Vec<Attribute>,
    field: FieldArgs,
    relation: Option<RelationArgs>,
}

impl FieldSpec {
    fn is_list(&self) -> bool {
        vec_inner(&self.ty).is_some()
    }

    /// Related entity type: explicit `target`, else the (element) type itself.
    fn target_type(&self, relation: &RelationArgs) -> syn::Result<Type> {
        match &relation.target {
            Some(target) => target.parse(),
            None => Ok(vec_inner(&self.ty).unwrap_or(&self.ty).clone()),
        }
    }
}

fn vec_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Vec" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn parse_fields(input: &ItemStruct) -> syn::Result<Vec<FieldSpec>> {
    let Fields::Named(named) = &input.fields else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "#[entity] requires a struct with named fields",
        ));
    };

    let mut specs = Vec::new();
    for field in &named.named {
        let Some(ident) = field.ident.clone() else {
            continue;
        };

        let mut field_args = FieldArgs::default();
        let mut relation = None;
        let mut docs = Vec::new();

        for attr in &field.attrs {
            if attr.path().is_ident("field") {
                attr.parse_nested_meta(|meta| field_args.parse(meta))?;
            } else if attr.path().is_ident("relation") {
                let mut args = RelationArgs::default();
                if !matches!(attr.meta, syn::Meta::Path(_)) {
                    attr.parse_nested_meta(|meta| args.parse(meta))?;
                }
                relation = Some(args);
            } else if attr.path().is_ident("doc") {
                docs.push(attr.clone());
            }
        }

        let graphql_name = field_args
            .rename
            .as_ref()
            .map(LitStr::value)
            .unwrap_or_else(|| ident.to_string());

        specs.push(FieldSpec {
            ident,
            graphql_name,
            ty: field.ty.clone(),
            docs,
            field: field_args,
            relation,
        });
    }

    Ok(specs)
}

fn option_str(value: Option<String>) -> TokenStream2 {
    match value {
        Some(value) => quote! { ::core::option::Option::Some(#value) },
        None => quote! { ::core::option::Option::None },
    }
}

fn expand_field_def(spec: &FieldSpec) -> syn::Result<TokenStream2> {
    let name = &spec.graphql_name;
    let ty = &spec.ty;
    let list = spec.is_list();

    let kind = match &spec.relation {
        None => quote! { crate::graphql::orm::FieldKind::Scalar },
        Some(relation) => {
            let target = spec.target_type(relation)?;
            match &relation.via {
                Some(via) => quote! {
                    crate::graphql::orm::FieldKind::Complex {
                        target: <#target as crate::graphql::orm::Entity>::schema,
                        via: #via,
                        list: #list,
                    }
                },
                None => quote! {
                    crate::graphql::orm::FieldKind::Entity {
                        target: <#target as crate::graphql::orm::Entity>::schema,
                        list: #list,
                    }
                },
            }
        }
    };

    let tracked = spec.field.tracked || spec.relation.as_ref().is_some_and(|r| r.to.is_some());
    let selection = option_str(spec.field.select.as_ref().map(LitStr::value));

    Ok(quote! {
        crate::graphql::orm::FieldDef {
            name: #name,
            kind: #kind,
            tracked: #tracked,
            selection: #selection,
            check: crate::graphql::orm::check_value::<#ty>,
        }
    })
}

fn expand_relationship(spec: &FieldSpec, relation: &RelationArgs) -> syn::Result<TokenStream2> {
    let name = &spec.graphql_name;
    let list = spec.is_list();
    let target = spec.target_type(relation)?;
    let target_field = relation
        .to
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| name.clone());

    let strategy = if relation.via.is_some() {
        quote! { crate::graphql::orm::FetchStrategy::ComplexObject }
    } else if let Some(query) = &relation.query {
        let missing = |what: &str| {
            syn::Error::new_spanned(&spec.ident, format!("filtered relation requires `{}`", what))
        };
        let filter_arg = relation.filter_arg.as_ref().ok_or_else(|| missing("filter_arg"))?;
        let filter_field = relation.filter_field.as_ref().ok_or_else(|| missing("filter_field"))?;
        let result = relation.result.as_ref().ok_or_else(|| missing("result"))?;
        quote! {
            crate::graphql::orm::FetchStrategy::FilterQuery(crate::graphql::orm::FilterQuery {
                query: #query,
                filter_arg: #filter_arg,
                filter_field: #filter_field,
                result_field: #result,
            })
        }
    } else {
        quote! { crate::graphql::orm::FetchStrategy::DirectField }
    };

    let inverse = match &relation.inverse {
        Some(field) => quote! {
            ::core::option::Option::Some(crate::graphql::orm::InverseEdge {
                type_name: <#target as crate::graphql::orm::Entity>::TYPE_NAME,
                field: #field,
            })
        },
        None => quote! { ::core::option::Option::None },
    };

    let transform = match &relation.transform {
        Some(path) => {
            let path: Path = path.parse()?;
            quote! {
                ::core::option::Option::Some(#path as crate::graphql::orm::LinkTransform)
            }
        }
        None => quote! { ::core::option::Option::None },
    };

    let auto_sync = relation.auto_sync.unwrap_or(true);

    Ok(quote! {
        crate::graphql::orm::RelationshipMetadata {
            field: #name,
            target_field: #target_field,
            list: #list,
            strategy: #strategy,
            inverse: #inverse,
            transform: #transform,
            auto_sync: #auto_sync,
        }
    })
}

fn expand_operations(args: &EntityArgs, type_name: &str) -> TokenStream2 {
    let camel = type_name.to_case(Case::Camel);
    let snake = type_name.to_case(Case::Snake);

    let find = args
        .find
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| format!("find{}", type_name));
    let find_by_input = args.find_input;

    let plural = args.plural.as_ref().map(LitStr::value);
    let list = option_str(plural.as_ref().map(|p| format!("find{}", p)));
    let list_key = option_str(plural.as_ref().map(|p| p.to_case(Case::Snake)));
    let list_filter = option_str(plural.as_ref().map(|_| format!("{}_filter", snake)));
    let list_filter_type = option_str(plural.as_ref().map(|_| format!("{}FilterType", type_name)));

    let creatable = !args.read_only && !args.no_create;
    let updatable = !args.read_only;
    let destroyable = !args.read_only && !args.no_destroy;

    let create = option_str(creatable.then(|| format!("{}Create", camel)));
    let create_input = option_str(creatable.then(|| format!("{}CreateInput", type_name)));
    let update = option_str(updatable.then(|| format!("{}Update", camel)));
    let update_input = option_str(updatable.then(|| format!("{}UpdateInput", type_name)));
    let destroy = option_str(destroyable.then(|| format!("{}Destroy", camel)));
    let destroy_input = option_str(destroyable.then(|| format!("{}DestroyInput", type_name)));

    quote! {
        crate::graphql::orm::Operations {
            find: #find,
            find_by_input: #find_by_input,
            list: #list,
            list_key: #list_key,
            list_filter: #list_filter,
            list_filter_type: #list_filter_type,
            create: #create,
            create_input: #create_input,
            update: #update,
            update_input: #update_input,
            destroy: #destroy,
            destroy_input: #destroy_input,
        }
    }
}

fn expand_accessors(spec: &FieldSpec) -> TokenStream2 {
    let ident = &spec.ident;
    let setter = format_ident!("set_{}", ident);
    let name = &spec.graphql_name;
    let ty = &spec.ty;
    let docs = &spec.docs;

    quote! {
        #(#docs)*
        pub fn #ident(&self) -> crate::graphql::orm::Field<#ty> {
            self.0.get_typed::<#ty>(#name)
        }

        pub fn #setter(&self, value: impl ::core::convert::Into<crate::graphql::orm::Field<#ty>>) {
            self.0.set_typed::<#ty>(#name, value.into())
        }
    }
}

fn expand_entity(args: EntityArgs, input: ItemStruct) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let vis = &input.vis;
    let docs: Vec<&Attribute> = input.attrs.iter().filter(|a| a.path().is_ident("doc")).collect();

    let type_name = args
        .name
        .as_ref()
        .map(LitStr::value)
        .unwrap_or_else(|| ident.to_string());
    let label = option_str(args.label.as_ref().map(LitStr::value));

    let specs = parse_fields(&input)?;

    if let Some(label) = &args.label {
        if !specs.iter().any(|s| s.graphql_name == label.value()) {
            return Err(syn::Error::new_spanned(label, "label must name a declared field"));
        }
    }

    let field_defs = specs
        .iter()
        .map(expand_field_def)
        .collect::<syn::Result<Vec<_>>>()?;
    let relationships = specs
        .iter()
        .filter_map(|spec| spec.relation.as_ref().map(|r| expand_relationship(spec, r)))
        .collect::<syn::Result<Vec<_>>>()?;
    let accessors = specs.iter().map(expand_accessors);
    let operations = expand_operations(&args, &type_name);

    let upper = ident.to_string().to_case(Case::UpperSnake);
    let fields_static = format_ident!("__{}_FIELDS", upper);
    let relationships_static = format_ident!("__{}_RELATIONSHIPS", upper);
    let schema_static = format_ident!("__{}_SCHEMA", upper);
    let field_count = field_defs.len();
    let relationship_count = relationships.len();

    Ok(quote! {
        #(#docs)*
        #[derive(Clone, PartialEq, Eq, Hash)]
        #vis struct #ident(crate::graphql::orm::EntityRef);

        #[doc(hidden)]
        static #fields_static: [crate::graphql::orm::FieldDef; #field_count] = [#(#field_defs),*];

        #[doc(hidden)]
        static #relationships_static: [crate::graphql::orm::RelationshipMetadata; #relationship_count] =
            [#(#relationships),*];

        #[doc(hidden)]
        static #schema_static: crate::graphql::orm::EntitySchema = crate::graphql::orm::EntitySchema {
            type_name: #type_name,
            label_field: #label,
            fields: &#fields_static,
            relationships: &#relationships_static,
            operations: #operations,
        };

        impl crate::graphql::orm::Entity for #ident {
            const TYPE_NAME: &'static str = #type_name;

            fn schema() -> &'static crate::graphql::orm::EntitySchema {
                &#schema_static
            }

            fn from_ref(entity: crate::graphql::orm::EntityRef) -> Self {
                Self(entity)
            }

            fn entity_ref(&self) -> &crate::graphql::orm::EntityRef {
                &self.0
            }
        }

        impl crate::graphql::orm::FieldType for #ident {
            fn from_value(
                value: &crate::graphql::orm::Value,
            ) -> ::core::result::Result<Self, ::std::string::String> {
                crate::graphql::orm::entity_from_value(value, #type_name).map(Self)
            }

            fn into_value(self) -> crate::graphql::orm::Value {
                crate::graphql::orm::Value::Entity(self.0)
            }
        }

        impl ::core::ops::Deref for #ident {
            type Target = crate::graphql::orm::EntityRef;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl ::core::fmt::Debug for #ident {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Debug::fmt(&self.0, f)
            }
        }

        impl ::core::default::Default for #ident {
            fn default() -> Self {
                Self::new()
            }
        }

        impl #ident {
            /// Create a new, unsaved entity with a placeholder id.
            pub fn new() -> Self {
                Self(crate::graphql::orm::EntityRef::new(&#schema_static))
            }

            #(#accessors)*
        }
    })
}
