use std::sync::Arc;

use lazy_static::lazy_static;
use serde_json::{json, Value as Json};

use crate::components::values::ValueCursor;
use crate::context::Context;
use crate::env::Env;
use crate::interpreter;
use crate::proto::ProtoJson;
use crate::query::Query;
use crate::result::{Outcome, Problem};
use crate::schema::{FieldDef, InputValueDef, Schema, Type, TypeDef, TypeKind};

/// The schema the introspection data itself is traversed under.
const META_SDL: &str = r#"
    schema { query: IntrospectionRoot }

    type IntrospectionRoot {
      __schema: __Schema!
    }

    type __Schema {
      queryType: __Type!
      mutationType: __Type
      subscriptionType: __Type
      types: [__Type!]!
      directives: [__Directive!]!
    }

    type __Type {
      kind: String!
      name: String
      description: String
      fields: [__Field!]
      interfaces: [__Type!]
      possibleTypes: [__Type!]
      enumValues: [__EnumValue!]
      inputFields: [__InputValue!]
      ofType: __Type
    }

    type __Field {
      name: String!
      description: String
      args: [__InputValue!]!
      type: __Type!
      isDeprecated: Boolean!
      deprecationReason: String
    }

    type __InputValue {
      name: String!
      description: String
      type: __Type!
      defaultValue: String
    }

    type __EnumValue {
      name: String!
      description: String
      isDeprecated: Boolean!
      deprecationReason: String
    }

    type __Directive {
      name: String!
      description: String
      locations: [String!]!
      args: [__InputValue!]!
    }
"#;

lazy_static! {
    static ref META_SCHEMA: Arc<Schema> = match crate::schema::from_sdl(META_SDL) {
        Outcome::Success(schema) => schema,
        other => panic!("invalid introspection meta-schema: {:?}", other.problems()),
    };
}

/// Resolve an introspection selection against the given schema, by running
/// it as an ordinary value traversal over the schema's introspection JSON.
pub fn run(schema: &Arc<Schema>, query: &Query) -> Outcome<ProtoJson> {
    let meta = META_SCHEMA.clone();
    let Some(root_tpe) = meta.query_type() else {
        return Outcome::failure(Problem::new("Introspection root type is not defined"));
    };
    let context = Context::root(meta.clone(), root_tpe.clone());
    let cursor = ValueCursor::root(context, introspection_data(schema), Env::empty());
    interpreter::run_value(query, &root_tpe, &cursor)
}

/// The introspection value for a schema, shaped after the standard
/// `__schema` result.
pub fn introspection_data(schema: &Schema) -> Json {
    let types: Vec<Json> = schema
        .types
        .iter()
        .map(|def| type_json(schema, def))
        .collect();
    json!({
        "__schema": {
            "queryType": named_ref(schema, &schema.query_type),
            "mutationType": Json::Null,
            "subscriptionType": Json::Null,
            "types": types,
            "directives": [],
        }
    })
}

fn kind_str(kind: &TypeKind) -> &'static str {
    match kind {
        TypeKind::Scalar => "SCALAR",
        TypeKind::Enum { .. } => "ENUM",
        TypeKind::Object { .. } => "OBJECT",
        TypeKind::Interface { .. } => "INTERFACE",
        TypeKind::Union { .. } => "UNION",
        TypeKind::InputObject { .. } => "INPUT_OBJECT",
    }
}

/// A `__Type` object carrying every member, so any selection over it can be
/// satisfied by the value cursor.
fn type_object(overrides: Vec<(&str, Json)>) -> Json {
    let mut object = serde_json::Map::new();
    for key in [
        "kind",
        "name",
        "description",
        "fields",
        "interfaces",
        "possibleTypes",
        "enumValues",
        "inputFields",
        "ofType",
    ] {
        object.insert(key.to_string(), Json::Null);
    }
    for (key, value) in overrides {
        object.insert(key.to_string(), value);
    }
    Json::Object(object)
}

fn named_ref(schema: &Schema, name: &str) -> Json {
    let kind = schema
        .type_def(name)
        .map(|def| kind_str(&def.kind))
        .unwrap_or("SCALAR");
    type_object(vec![("kind", json!(kind)), ("name", json!(name))])
}

fn type_json(schema: &Schema, def: &TypeDef) -> Json {
    let mut overrides = vec![
        ("kind", json!(kind_str(&def.kind))),
        ("name", json!(def.name)),
    ];
    match &def.kind {
        TypeKind::Object { fields, interfaces } => {
            overrides.push(("fields", fields_json(schema, fields)));
            overrides.push((
                "interfaces",
                Json::Array(
                    interfaces
                        .iter()
                        .map(|name| named_ref(schema, name))
                        .collect(),
                ),
            ));
        }
        TypeKind::Interface { fields, interfaces } => {
            overrides.push(("fields", fields_json(schema, fields)));
            overrides.push((
                "interfaces",
                Json::Array(
                    interfaces
                        .iter()
                        .map(|name| named_ref(schema, name))
                        .collect(),
                ),
            ));
            overrides.push(("possibleTypes", possible_types_json(schema, &def.name)));
        }
        TypeKind::Union { .. } => {
            overrides.push(("possibleTypes", possible_types_json(schema, &def.name)));
        }
        TypeKind::Enum { values } => {
            overrides.push((
                "enumValues",
                Json::Array(
                    values
                        .iter()
                        .map(|value| {
                            json!({
                                "name": value,
                                "description": Json::Null,
                                "isDeprecated": false,
                                "deprecationReason": Json::Null,
                            })
                        })
                        .collect(),
                ),
            ));
        }
        TypeKind::InputObject { fields } => {
            overrides.push((
                "inputFields",
                Json::Array(
                    fields
                        .iter()
                        .map(|field| input_value_json(schema, field))
                        .collect(),
                ),
            ));
        }
        TypeKind::Scalar => {}
    }
    type_object(overrides)
}

fn possible_types_json(schema: &Schema, name: &str) -> Json {
    let mut members: Vec<&String> = schema
        .possible_types(name)
        .map(|possible| possible.iter().collect())
        .unwrap_or_default();
    members.sort();
    Json::Array(
        members
            .into_iter()
            .map(|member| named_ref(schema, member))
            .collect(),
    )
}

fn fields_json(schema: &Schema, fields: &[FieldDef]) -> Json {
    Json::Array(
        fields
            .iter()
            .map(|field| {
                json!({
                    "name": field.name,
                    "description": Json::Null,
                    "args": field
                        .args
                        .iter()
                        .map(|arg| input_value_json(schema, arg))
                        .collect::<Vec<_>>(),
                    "type": type_ref_json(schema, &field.tpe),
                    "isDeprecated": field.deprecation.is_some(),
                    "deprecationReason": field.deprecation,
                })
            })
            .collect(),
    )
}

fn input_value_json(schema: &Schema, input: &InputValueDef) -> Json {
    json!({
        "name": input.name,
        "description": Json::Null,
        "type": type_ref_json(schema, &input.tpe),
        "defaultValue": Json::Null,
    })
}

/// A type reference rendered with the standard `NON_NULL`/`LIST` wrapping:
/// our model wraps nullability, introspection wraps non-nullability.
fn type_ref_json(schema: &Schema, tpe: &Type) -> Json {
    match tpe {
        Type::Nullable(inner) => base_ref_json(schema, inner),
        other => type_object(vec![
            ("kind", json!("NON_NULL")),
            ("ofType", base_ref_json(schema, other)),
        ]),
    }
}

fn base_ref_json(schema: &Schema, tpe: &Type) -> Json {
    match tpe {
        Type::List(inner) => type_object(vec![
            ("kind", json!("LIST")),
            ("ofType", type_ref_json(schema, inner)),
        ]),
        Type::Named(def) => named_ref(schema, &def.name),
        Type::Ref(name) => named_ref(schema, name),
        Type::Nullable(inner) => base_ref_json(schema, inner),
    }
}
