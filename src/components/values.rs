use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as Json;
use tracing::instrument;

use crate::context::Context;
use crate::cursor::{Cursor, CursorRef};
use crate::env::Env;
use crate::interpreter;
use crate::mapping::ComponentInterpreter;
use crate::proto::ProtoJson;
use crate::query::normalize::select_parts;
use crate::query::value::Binding;
use crate::query::Query;
use crate::result::{ExecutionError, Outcome, Problem};
use crate::schema::{Schema, Type, TypeKind, TYPENAME_FIELD};

/// A cursor over in-memory JSON data, typed by the schema carried in its
/// context. Narrowing consults a `__typename` discriminator on the focus,
/// checked against the schema's possible-types relation.
#[derive(Clone, Debug)]
pub struct ValueCursor {
    context: Context,
    focus: Arc<Json>,
    parent: Option<CursorRef>,
    env: Env,
}

impl ValueCursor {
    pub fn root(context: Context, focus: Json, env: Env) -> ValueCursor {
        ValueCursor {
            context,
            focus: Arc::new(focus),
            parent: None,
            env,
        }
    }

    fn spawn(&self, context: Context, focus: Arc<Json>) -> CursorRef {
        Arc::new(ValueCursor {
            context,
            focus,
            parent: Some(self.to_ref()),
            env: Env::empty(),
        })
    }

    fn leaf_def(&self) -> Option<Arc<crate::schema::TypeDef>> {
        let def = match &self.context.tpe {
            Type::Named(def) => Some(def.clone()),
            Type::Ref(name) => self.context.schema.type_def(name).cloned(),
            _ => None,
        };
        def.filter(|def| def.is_leaf())
    }

    /// The concrete runtime type name of the focus: its discriminator when
    /// present, the static type name otherwise.
    fn type_name(&self) -> String {
        self.focus
            .get(TYPENAME_FIELD)
            .and_then(Json::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.context.tpe.underlying().name())
    }
}

impl Cursor for ValueCursor {
    fn context(&self) -> &Context {
        &self.context
    }

    fn env(&self) -> &Env {
        &self.env
    }

    fn parent(&self) -> Option<&CursorRef> {
        self.parent.as_ref()
    }

    fn focus(&self) -> &(dyn Any + Send + Sync) {
        self.focus.as_ref()
    }

    fn with_env(&self, env: Env) -> CursorRef {
        let mut next = self.clone();
        next.env = next.env.add(&env);
        Arc::new(next)
    }

    fn to_ref(&self) -> CursorRef {
        Arc::new(self.clone())
    }

    fn is_leaf(&self) -> bool {
        self.leaf_def().is_some()
    }

    fn as_leaf(&self) -> Outcome<Json> {
        let Some(def) = self.leaf_def() else {
            return Outcome::failure(ExecutionError::TypeMismatch {
                expected: "a leaf type".to_string(),
                found: self.context.tpe.to_string(),
            });
        };
        if self.focus.is_object() || self.focus.is_array() {
            return Outcome::failure(ExecutionError::TypeMismatch {
                expected: format!("a {} value", def.name),
                found: "a structured value".to_string(),
            });
        }
        if let TypeKind::Enum { values } = &def.kind {
            match self.focus.as_str() {
                Some(value) if values.iter().any(|v| v == value) => {}
                _ => {
                    return Outcome::failure(ExecutionError::TypeMismatch {
                        expected: format!("a value of enum {}", def.name),
                        found: self.focus.to_string(),
                    })
                }
            }
        }
        Outcome::Success(self.focus.as_ref().clone())
    }

    fn is_list(&self) -> bool {
        self.context.tpe.is_list()
    }

    fn as_list(&self) -> Outcome<Vec<CursorRef>> {
        let Type::List(item) = &self.context.tpe else {
            return Outcome::failure(ExecutionError::TypeMismatch {
                expected: "a list type".to_string(),
                found: self.context.tpe.to_string(),
            });
        };
        let Some(items) = self.focus.as_array() else {
            return Outcome::failure(ExecutionError::TypeMismatch {
                expected: format!("a list of {}", item.name()),
                found: self.focus.to_string(),
            });
        };
        let item_context = self.context.as_type((**item).clone());
        Outcome::Success(
            items
                .iter()
                .map(|value| self.spawn(item_context.clone(), Arc::new(value.clone())))
                .collect(),
        )
    }

    fn is_nullable(&self) -> bool {
        self.context.tpe.is_nullable()
    }

    fn as_nullable(&self) -> Outcome<Option<CursorRef>> {
        let Type::Nullable(inner) = &self.context.tpe else {
            return Outcome::failure(ExecutionError::TypeMismatch {
                expected: "a nullable type".to_string(),
                found: self.context.tpe.to_string(),
            });
        };
        if self.focus.is_null() {
            Outcome::Success(None)
        } else {
            let context = self.context.as_type((**inner).clone());
            Outcome::Success(Some(self.spawn(context, self.focus.clone())))
        }
    }

    fn is_null(&self) -> bool {
        self.focus.is_null()
    }

    fn narrows_to(&self, subtpe: &Type) -> bool {
        let current = self.context.tpe.underlying().name();
        let target = subtpe.underlying().name();
        let schema = &self.context.schema;
        if target != current && !schema.satisfies_type_condition(&target, &current) {
            return false;
        }
        match self.focus.get(TYPENAME_FIELD).and_then(Json::as_str) {
            Some(type_name) => schema.satisfies_type_condition(type_name, &target),
            None => target == current,
        }
    }

    fn narrow(&self, subtpe: &Type) -> Outcome<CursorRef> {
        if !self.narrows_to(subtpe) {
            return Outcome::failure(ExecutionError::NarrowingFailed {
                type_name: self.context.tpe.underlying().name(),
                subtype_name: subtpe.underlying().name(),
            });
        }
        self.context.schema.resolve(subtpe).map(|resolved| {
            self.spawn(self.context.as_type(resolved), self.focus.clone())
        })
    }

    fn has_field(&self, field_name: &str) -> bool {
        if self.context.for_field(field_name, None).is_none() {
            return false;
        }
        if field_name == TYPENAME_FIELD {
            return self.focus.is_object();
        }
        self.focus
            .as_object()
            .is_some_and(|object| object.contains_key(field_name))
    }

    fn field(&self, field_name: &str, result_name: Option<&str>) -> Outcome<CursorRef> {
        if !self.has_field(field_name) {
            return Outcome::failure(ExecutionError::FieldNotFound {
                field_name: field_name.to_string(),
                type_name: self.context.tpe.underlying().name(),
            });
        }
        let Some(context) = self.context.for_field(field_name, result_name) else {
            return Outcome::failure(ExecutionError::FieldNotFound {
                field_name: field_name.to_string(),
                type_name: self.context.tpe.underlying().name(),
            });
        };
        let focus = if field_name == TYPENAME_FIELD {
            Arc::new(Json::String(self.type_name()))
        } else {
            match self.focus.get(field_name) {
                Some(value) => Arc::new(value.clone()),
                None => Arc::new(Json::Null),
            }
        };
        Outcome::Success(self.spawn(context, focus))
    }
}

pub type RootResolver = Arc<dyn Fn(&[Binding]) -> Outcome<Json> + Send + Sync>;

/// An in-memory component: JSON values behind per-root-field resolvers.
/// A root field nobody here resolves is left as a deferred hole, to be
/// claimed by another component during completion.
pub struct ValueComponent {
    schema: Arc<Schema>,
    env: Env,
    roots: Vec<(String, RootResolver)>,
}

impl ValueComponent {
    pub fn new(schema: Arc<Schema>) -> ValueComponent {
        ValueComponent {
            schema,
            env: Env::empty(),
            roots: vec![],
        }
    }

    /// Serve `field_name` with a constant value.
    pub fn with_root_value(self, field_name: impl Into<String>, value: Json) -> ValueComponent {
        self.with_root_resolver(field_name, move |_| Outcome::Success(value.clone()))
    }

    /// Serve `field_name` by running the resolver against the select's
    /// bindings.
    pub fn with_root_resolver(
        mut self,
        field_name: impl Into<String>,
        resolver: impl Fn(&[Binding]) -> Outcome<Json> + Send + Sync + 'static,
    ) -> ValueComponent {
        self.roots.push((field_name.into(), Arc::new(resolver)));
        self
    }

    pub fn with_env(mut self, env: Env) -> ValueComponent {
        self.env = env;
        self
    }

    fn resolver(&self, field_name: &str) -> Option<&RootResolver> {
        self.roots
            .iter()
            .find(|(name, _)| name == field_name)
            .map(|(_, resolver)| resolver)
    }
}

#[async_trait]
impl ComponentInterpreter for ValueComponent {
    #[instrument(level = "trace", skip_all, name = "ValueComponent::run_root_value")]
    async fn run_root_value(&self, query: &Query) -> Outcome<ProtoJson> {
        let Some(root_tpe) = self.schema.query_type() else {
            return Outcome::failure(Problem::new(format!(
                "Query root type {} is not defined",
                self.schema.query_type
            )));
        };
        let Some((name, result_name, args, child)) = select_parts(query) else {
            return ExecutionError::MalformedQuery {
                reason: "root query must be a field selection".to_string(),
            }
            .into();
        };
        match self.resolver(name) {
            None => {
                let context = Context::root(self.schema.clone(), root_tpe.clone());
                let cursor = ValueCursor::root(context, Json::Object(Default::default()), self.env.clone());
                Outcome::Success(ProtoJson::Deferred {
                    cursor: Arc::new(cursor),
                    tpe: root_tpe,
                    field_name: name.to_string(),
                    query: query.clone(),
                })
            }
            Some(resolver) => resolver(args).and_then(|value| {
                let root_context = Context::root(self.schema.clone(), root_tpe);
                let Some(field_context) = root_context.for_field(name, Some(result_name)) else {
                    return Outcome::failure(ExecutionError::FieldNotFound {
                        field_name: name.to_string(),
                        type_name: self.schema.query_type.clone(),
                    });
                };
                let tpe = field_context.tpe.clone();
                let path = field_context.problem_path();
                let cursor = ValueCursor::root(field_context, value, self.env.clone());
                interpreter::run_value(child, &tpe, &cursor).at_path(&path)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SDL: &str = r#"
        type Query {
          productions: [Production!]!
        }

        interface Production {
          title: String!
        }

        type Movie implements Production {
          title: String!
          director: Person
        }

        type Series implements Production {
          title: String!
          numberOfEpisodes: Int!
        }

        type Person {
          name: String!
        }
    "#;

    fn schema() -> Arc<Schema> {
        match crate::schema::from_sdl(SDL) {
            Outcome::Success(schema) => schema,
            other => panic!("unexpected problems: {:?}", other.problems()),
        }
    }

    fn productions_cursor() -> ValueCursor {
        let schema = schema();
        let root = Context::root(schema.clone(), schema.query_type().unwrap());
        let context = root.for_field("productions", None).unwrap();
        ValueCursor::root(
            context,
            json!([
                { "__typename": "Movie", "title": "Vertigo", "director": { "name": "Hitchcock" } },
                { "__typename": "Series", "title": "The Prisoner", "numberOfEpisodes": 17 }
            ]),
            Env::one("region", "uk".to_string()),
        )
    }

    #[test]
    fn list_elements_carry_the_item_type() {
        let cursor = productions_cursor();
        let items = match cursor.as_list() {
            Outcome::Success(items) => items,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].tpe().underlying().name(), "Production");
        assert!(!items[0].is_list());
    }

    #[test]
    fn narrowing_follows_the_discriminator() {
        let cursor = productions_cursor();
        let items = match cursor.as_list() {
            Outcome::Success(items) => items,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        let schema = schema();
        let movie = schema.named("Movie").unwrap();
        let series = schema.named("Series").unwrap();

        assert!(items[0].narrows_to(&movie));
        assert!(!items[0].narrows_to(&series));
        let narrowed = match items[0].narrow(&movie) {
            Outcome::Success(cursor) => cursor,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        assert_eq!(narrowed.tpe().name(), "Movie");
        assert!(narrowed.has_field("director"));

        assert!(items[1].narrow(&movie).is_failure());
    }

    #[test]
    fn typename_reflects_the_runtime_type() {
        let cursor = productions_cursor();
        let items = match cursor.as_list() {
            Outcome::Success(items) => items,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        let typename = items[1].field(TYPENAME_FIELD, None);
        let leaf = match typename {
            Outcome::Success(cursor) => cursor.as_leaf(),
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        assert_eq!(leaf, Outcome::Success(json!("Series")));
    }

    #[test]
    fn env_lookup_walks_the_parent_chain() {
        let cursor = productions_cursor();
        let items = match cursor.as_list() {
            Outcome::Success(items) => items,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        let movie = match items[0].narrow(&schema().named("Movie").unwrap()) {
            Outcome::Success(cursor) => cursor,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        let director = match movie.field("director", None) {
            Outcome::Success(cursor) => cursor,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        assert_eq!(
            director.env_value::<String>("region").map(String::as_str),
            Some("uk")
        );
        assert_eq!(director.env_value::<i64>("region"), None);
        assert!(director.require_env::<String>("missing").is_failure());
    }

    #[test]
    fn context_paths_stay_in_lockstep_through_projections() {
        let cursor = productions_cursor();
        let items = match cursor.as_list() {
            Outcome::Success(items) => items,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        let movie = match items[0].narrow(&schema().named("Movie").unwrap()) {
            Outcome::Success(cursor) => cursor,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        let director = match movie.field("director", Some("directedBy")) {
            Outcome::Success(cursor) => cursor,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        let mut current: CursorRef = director;
        loop {
            let context = current.context();
            assert_eq!(context.path.len(), context.result_path.len());
            match current.parent() {
                Some(parent) => current = parent.clone(),
                None => break,
            }
        }
    }

    #[test]
    fn derived_list_path_flattens_across_segments() {
        let cursor = productions_cursor();
        let titles = match cursor.list_path(&["title"]) {
            Outcome::Success(cursors) => cursors,
            other => panic!("unexpected problems: {:?}", other.problems()),
        };
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].as_leaf(), Outcome::Success(json!("Vertigo")));
        assert!(cursor.has_list_path(&["title"]));
        assert!(!cursor.has_list_path(&["nope"]));
    }

    #[test]
    fn focus_extraction_is_typed() {
        let cursor = productions_cursor();
        let as_json = (&cursor as &dyn Cursor).focus_as::<Json>();
        assert!(matches!(as_json, Outcome::Success(Json::Array(_))));
        assert!((&cursor as &dyn Cursor).focus_as::<String>().is_failure());
    }
}
