use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Display};
use std::sync::Arc;

use graphql_parser::schema::{Definition, SchemaDefinition, TypeDefinition};

use crate::result::{ExecutionError, Outcome, Problem};

pub const TYPENAME_FIELD: &str = "__typename";

/// The name of the synthetic scalar standing in for mapping-level
/// pseudo-fields that are not declared in the schema.
pub const ATTRIBUTE_TYPE: &str = "Attribute";

#[derive(Debug, Clone, PartialEq)]
pub struct InputValueDef {
    pub name: String,
    pub tpe: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub tpe: Type,
    pub args: Vec<InputValueDef>,
    pub deprecation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Scalar,
    Enum { values: Vec<String> },
    Object { fields: Vec<FieldDef>, interfaces: Vec<String> },
    Interface { fields: Vec<FieldDef>, interfaces: Vec<String> },
    Union { members: Vec<String> },
    InputObject { fields: Vec<InputValueDef> },
}

#[derive(Debug, PartialEq)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeKind,
}

impl TypeDef {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, TypeKind::Scalar | TypeKind::Enum { .. })
    }

    pub fn fields(&self) -> &[FieldDef] {
        match &self.kind {
            TypeKind::Object { fields, .. } | TypeKind::Interface { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields().iter().find(|f| f.name == name)
    }
}

/// The shape of a GraphQL type at a position: a resolved named type, a list
/// or nullable wrapper, or a by-name reference resolved on demand against
/// the schema.
#[derive(Clone)]
pub enum Type {
    Named(Arc<TypeDef>),
    List(Box<Type>),
    Nullable(Box<Type>),
    Ref(String),
}

impl Type {
    pub fn list(inner: Type) -> Type {
        Type::List(Box::new(inner))
    }

    pub fn nullable(inner: Type) -> Type {
        match inner {
            already @ Type::Nullable(_) => already,
            other => Type::Nullable(Box::new(other)),
        }
    }

    /// The synthetic scalar used by [`crate::context::Context`] for
    /// mapping-level pseudo-fields.
    pub fn attribute() -> Type {
        Type::nullable(Type::Named(Arc::new(TypeDef {
            name: ATTRIBUTE_TYPE.to_string(),
            kind: TypeKind::Scalar,
        })))
    }

    /// Name of the underlying named or referenced type, for messages.
    pub fn name(&self) -> String {
        match self {
            Type::Named(def) => def.name.clone(),
            Type::Ref(name) => name.clone(),
            Type::List(inner) => format!("[{}]", inner.name()),
            Type::Nullable(inner) => inner.name(),
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Type::List(_))
    }

    pub fn is_leaf(&self) -> bool {
        match self {
            Type::Named(def) => def.is_leaf(),
            _ => false,
        }
    }

    pub fn named_def(&self) -> Option<&Arc<TypeDef>> {
        match self {
            Type::Named(def) => Some(def),
            _ => None,
        }
    }

    /// Strip nullable and list wrappers down to the named or referenced core.
    pub fn underlying(&self) -> &Type {
        match self {
            Type::Nullable(inner) | Type::List(inner) => inner.underlying(),
            other => other,
        }
    }

    /// Strip a single nullable wrapper, if present.
    pub fn non_null(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Element type of a list, transparent to an outer nullable wrapper.
    pub fn item_type(&self) -> Option<&Type> {
        match self.non_null() {
            Type::List(inner) => Some(inner),
            _ => None,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Named(a), Type::Named(b)) => a.name == b.name,
            (Type::Ref(a), Type::Ref(b)) => a == b,
            (Type::Named(a), Type::Ref(b)) | (Type::Ref(b), Type::Named(a)) => a.name == *b,
            (Type::List(a), Type::List(b)) => a == b,
            (Type::Nullable(a), Type::Nullable(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Type {}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Named(def) => write!(f, "{}!", def.name),
            Type::Ref(name) => write!(f, "{}!", name),
            Type::List(inner) => write!(f, "[{}]!", inner),
            Type::Nullable(inner) => {
                let rendered = inner.to_string();
                write!(f, "{}", rendered.trim_end_matches('!'))
            }
        }
    }
}

impl Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Type({})", self)
    }
}

/// A validated schema: named type definitions, the query root, and the
/// transitively-closed possible-types relation for abstract types.
#[derive(Debug, PartialEq)]
pub struct Schema {
    pub types: Vec<Arc<TypeDef>>,
    pub query_type: String,
    possible_types: HashMap<String, HashSet<String>>,
}

impl Schema {
    /// First matching definition wins, preserving declaration order.
    pub fn type_def(&self, name: &str) -> Option<&Arc<TypeDef>> {
        self.types.iter().find(|def| def.name == name)
    }

    pub fn named(&self, name: &str) -> Option<Type> {
        self.type_def(name).map(|def| Type::Named(def.clone()))
    }

    pub fn query_type(&self) -> Option<Type> {
        self.named(&self.query_type)
    }

    /// Dereference a by-name type reference; other shapes pass through.
    pub fn resolve(&self, tpe: &Type) -> Outcome<Type> {
        match tpe {
            Type::Ref(name) => match self.named(name) {
                Some(resolved) => Outcome::Success(resolved),
                None => ExecutionError::UndefinedType {
                    type_name: name.clone(),
                }
                .into(),
            },
            other => Outcome::Success(other.clone()),
        }
    }

    fn underlying_def(&self, tpe: &Type) -> Option<Arc<TypeDef>> {
        match tpe.underlying() {
            Type::Named(def) => Some(def.clone()),
            Type::Ref(name) => self.type_def(name).cloned(),
            _ => None,
        }
    }

    /// The named object or interface definition beneath any wrappers.
    pub fn underlying_object(&self, tpe: &Type) -> Option<Arc<TypeDef>> {
        self.underlying_def(tpe).filter(|def| {
            matches!(
                def.kind,
                TypeKind::Object { .. } | TypeKind::Interface { .. } | TypeKind::Union { .. }
            )
        })
    }

    /// Declared type of `field` on the object or interface beneath `tpe`.
    pub fn underlying_field(&self, tpe: &Type, field: &str) -> Option<Type> {
        self.underlying_def(tpe)
            .and_then(|def| def.field(field).map(|f| f.tpe.clone()))
    }

    /// Declared type of `field` on `tpe` itself, transparent only to a
    /// nullable wrapper.
    pub fn field_type(&self, tpe: &Type, field: &str) -> Option<Type> {
        match tpe.non_null() {
            Type::Named(def) => def.field(field).map(|f| f.tpe.clone()),
            Type::Ref(name) => self
                .type_def(name)
                .and_then(|def| def.field(field).map(|f| f.tpe.clone())),
            _ => None,
        }
    }

    /// Walk a field-name path from `tpe`, transparent to wrappers.
    pub fn path_type(&self, tpe: &Type, names: &[&str]) -> Option<Type> {
        names.iter().try_fold(tpe.clone(), |current, name| {
            self.underlying_field(&current, name)
        })
    }

    pub fn possible_types(&self, name: &str) -> Option<&HashSet<String>> {
        self.possible_types.get(name)
    }

    /// True when an entity of `type_name` satisfies the abstract or concrete
    /// type `condition`.
    pub fn satisfies_type_condition(&self, type_name: &str, condition: &str) -> bool {
        type_name == condition
            || self
                .possible_types
                .get(condition)
                .is_some_and(|possible| possible.contains(type_name))
    }

    /// Narrowability: `tpe` narrows to `subtpe` when they coincide or when
    /// `subtpe` is among the possible types of the abstract `tpe`.
    pub fn narrows(&self, tpe: &Type, subtpe: &Type) -> bool {
        let from = tpe.underlying().name();
        let to = subtpe.underlying().name();
        self.satisfies_type_condition(&to, &from)
    }
}

const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

fn convert_type(tpe: &graphql_parser::schema::Type<'_, String>) -> Type {
    fn inner(tpe: &graphql_parser::schema::Type<'_, String>, nullable: bool) -> Type {
        match tpe {
            graphql_parser::schema::Type::NamedType(name) => {
                let core = Type::Ref(name.clone());
                if nullable {
                    Type::nullable(core)
                } else {
                    core
                }
            }
            graphql_parser::schema::Type::ListType(item) => {
                let core = Type::list(inner(item, true));
                if nullable {
                    Type::nullable(core)
                } else {
                    core
                }
            }
            graphql_parser::schema::Type::NonNullType(item) => inner(item, false),
        }
    }
    inner(tpe, true)
}

fn convert_fields(fields: &[graphql_parser::schema::Field<'_, String>]) -> Vec<FieldDef> {
    fields
        .iter()
        .map(|field| FieldDef {
            name: field.name.clone(),
            tpe: convert_type(&field.field_type),
            args: field
                .arguments
                .iter()
                .map(|arg| InputValueDef {
                    name: arg.name.clone(),
                    tpe: convert_type(&arg.value_type),
                })
                .collect(),
            deprecation: deprecation_of(&field.directives),
        })
        .collect()
}

/// The reason attached to an `@deprecated` directive, defaulting to the
/// standard reason when none is given.
fn deprecation_of(directives: &[graphql_parser::schema::Directive<'_, String>]) -> Option<String> {
    directives
        .iter()
        .find(|directive| directive.name == "deprecated")
        .map(|directive| {
            directive
                .arguments
                .iter()
                .find_map(|(name, value)| match (name.as_str(), value) {
                    ("reason", graphql_parser::schema::Value::String(reason)) => {
                        Some(reason.clone())
                    }
                    _ => None,
                })
                .unwrap_or_else(|| "No longer supported".to_string())
        })
}

fn referenced_names(tpe: &Type, into: &mut Vec<String>) {
    match tpe {
        Type::Ref(name) => into.push(name.clone()),
        Type::Named(_) => {}
        Type::List(inner) | Type::Nullable(inner) => referenced_names(inner, into),
    }
}

/// Build a [`Schema`] from SDL. References to undefined types are collected
/// as problems; the result is `Warnings` when the query root still resolved
/// and `Failure` when no usable schema survived.
pub fn from_sdl(sdl: &str) -> Outcome<Arc<Schema>> {
    let document = match graphql_parser::parse_schema::<String>(sdl) {
        Ok(document) => document,
        Err(error) => return Outcome::failure(Problem::new(error.to_string())),
    };

    let mut types: Vec<Arc<TypeDef>> = BUILTIN_SCALARS
        .iter()
        .map(|name| {
            Arc::new(TypeDef {
                name: name.to_string(),
                kind: TypeKind::Scalar,
            })
        })
        .collect();
    let mut query_type = "Query".to_string();
    let mut first_possible_types: HashMap<String, Vec<String>> = HashMap::new();

    for definition in &document.definitions {
        match definition {
            Definition::SchemaDefinition(SchemaDefinition { query, .. }) => {
                if let Some(query) = query {
                    query_type = query.clone();
                }
            }
            Definition::TypeDefinition(TypeDefinition::Scalar(scalar)) => {
                types.push(Arc::new(TypeDef {
                    name: scalar.name.clone(),
                    kind: TypeKind::Scalar,
                }));
            }
            Definition::TypeDefinition(TypeDefinition::Enum(enum_type)) => {
                types.push(Arc::new(TypeDef {
                    name: enum_type.name.clone(),
                    kind: TypeKind::Enum {
                        values: enum_type.values.iter().map(|v| v.name.clone()).collect(),
                    },
                }));
            }
            Definition::TypeDefinition(TypeDefinition::Object(object)) => {
                for interface in &object.implements_interfaces {
                    first_possible_types
                        .entry(interface.clone())
                        .or_default()
                        .push(object.name.clone());
                }
                types.push(Arc::new(TypeDef {
                    name: object.name.clone(),
                    kind: TypeKind::Object {
                        fields: convert_fields(&object.fields),
                        interfaces: object.implements_interfaces.clone(),
                    },
                }));
            }
            Definition::TypeDefinition(TypeDefinition::Interface(interface)) => {
                for parent in &interface.implements_interfaces {
                    first_possible_types
                        .entry(parent.clone())
                        .or_default()
                        .push(interface.name.clone());
                }
                types.push(Arc::new(TypeDef {
                    name: interface.name.clone(),
                    kind: TypeKind::Interface {
                        fields: convert_fields(&interface.fields),
                        interfaces: interface.implements_interfaces.clone(),
                    },
                }));
            }
            Definition::TypeDefinition(TypeDefinition::Union(union_type)) => {
                first_possible_types.insert(union_type.name.clone(), union_type.types.clone());
                types.push(Arc::new(TypeDef {
                    name: union_type.name.clone(),
                    kind: TypeKind::Union {
                        members: union_type.types.clone(),
                    },
                }));
            }
            Definition::TypeDefinition(TypeDefinition::InputObject(input)) => {
                types.push(Arc::new(TypeDef {
                    name: input.name.clone(),
                    kind: TypeKind::InputObject {
                        fields: input
                            .fields
                            .iter()
                            .map(|field| InputValueDef {
                                name: field.name.clone(),
                                tpe: convert_type(&field.value_type),
                            })
                            .collect(),
                    },
                }));
            }
            Definition::TypeExtension(_) | Definition::DirectiveDefinition(_) => {}
        }
    }

    // One level of indirection is enough to close the relation: an
    // interface's implementors include the implementors of any interface
    // that implements it.
    let mut possible_types: HashMap<String, HashSet<String>> = HashMap::new();
    for (name, direct) in &first_possible_types {
        let mut closed: HashSet<String> = HashSet::new();
        for member in direct {
            closed.insert(member.clone());
            if let Some(transitive) = first_possible_types.get(member) {
                closed.extend(transitive.iter().cloned());
            }
        }
        possible_types.insert(name.clone(), closed);
    }

    let schema = Schema {
        types,
        query_type,
        possible_types,
    };

    let mut missing: Vec<String> = vec![];
    let mut note_missing = |name: &String, missing: &mut Vec<String>| {
        if schema.type_def(name).is_none() && !missing.contains(name) {
            missing.push(name.clone());
        }
    };
    for def in &schema.types {
        let mut referenced = vec![];
        match &def.kind {
            TypeKind::Object { fields, interfaces } | TypeKind::Interface { fields, interfaces } => {
                for field in fields {
                    referenced_names(&field.tpe, &mut referenced);
                    for arg in &field.args {
                        referenced_names(&arg.tpe, &mut referenced);
                    }
                }
                referenced.extend(interfaces.iter().cloned());
            }
            TypeKind::Union { members } => referenced.extend(members.iter().cloned()),
            TypeKind::InputObject { fields } => {
                for field in fields {
                    referenced_names(&field.tpe, &mut referenced);
                }
            }
            TypeKind::Scalar | TypeKind::Enum { .. } => {}
        }
        for name in &referenced {
            note_missing(name, &mut missing);
        }
    }

    let problems: Vec<Problem> = missing
        .iter()
        .map(|name| {
            Problem::from(ExecutionError::UndefinedType {
                type_name: name.clone(),
            })
        })
        .collect();

    if schema.type_def(&schema.query_type).is_none() {
        let mut problems = problems;
        problems.push(Problem::new(format!(
            "Query root type {} is not defined",
            schema.query_type
        )));
        Outcome::Failure(problems)
    } else {
        Outcome::warnings(problems, Arc::new(schema))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDL: &str = r#"
        type Query {
          movie(id: ID!): Movie
          movies: [Movie!]!
        }

        interface Production {
          title: String!
        }

        type Movie implements Production {
          id: ID!
          title: String!
          genre: Genre!
        }

        type Series implements Production {
          title: String!
          numberOfEpisodes: Int!
        }

        enum Genre { DRAMA ACTION COMEDY }
    "#;

    fn schema() -> Arc<Schema> {
        match from_sdl(SDL) {
            Outcome::Success(schema) => schema,
            other => panic!("expected a clean schema, got {:?}", other.problems()),
        }
    }

    #[test]
    fn resolves_field_types_through_wrappers() {
        let schema = schema();
        let query = schema.query_type().unwrap();
        let movie = schema.field_type(&query, "movie").unwrap();
        assert!(movie.is_nullable());
        assert_eq!(movie.underlying().name(), "Movie");

        let movies = schema.field_type(&query, "movies").unwrap();
        assert!(movies.is_list());
        assert_eq!(movies.item_type().unwrap().underlying().name(), "Movie");
    }

    #[test]
    fn path_type_walks_through_lists() {
        let schema = schema();
        let query = schema.query_type().unwrap();
        let genre = schema.path_type(&query, &["movies", "genre"]).unwrap();
        assert_eq!(genre.underlying().name(), "Genre");
    }

    #[test]
    fn interface_narrows_to_implementors() {
        let schema = schema();
        let production = schema.named("Production").unwrap();
        let movie = schema.named("Movie").unwrap();
        assert!(schema.narrows(&production, &movie));
        assert!(!schema.narrows(&movie, &production));
        assert!(schema.satisfies_type_condition("Series", "Production"));
    }

    #[test]
    fn undefined_reference_is_reported() {
        let sdl = r#"
            type Query { episode: Episod }
            type Episode { name: String }
        "#;
        match from_sdl(sdl) {
            Outcome::Warnings(problems, schema) => {
                assert_eq!(
                    problems[0].message,
                    "Reference to undefined type: Episod"
                );
                assert!(schema.type_def("Episode").is_some());
            }
            other => panic!("expected warnings, got {:?}", other.problems()),
        }
    }

    #[test]
    fn missing_query_root_is_fatal() {
        let sdl = "type Movie { id: ID! }";
        assert!(from_sdl(sdl).is_failure());
    }

    #[test]
    fn type_display_matches_sdl_conventions() {
        let schema = schema();
        let query = schema.query_type().unwrap();
        assert_eq!(
            schema.field_type(&query, "movies").unwrap().to_string(),
            "[Movie!]!"
        );
        assert_eq!(
            schema.field_type(&query, "movie").unwrap().to_string(),
            "Movie"
        );
    }
}
