use std::sync::Arc;

use serde_json::{json, Value as Json};

use crate::components::values::ValueComponent;
use crate::mapping::{ComponentInterpreter, Mapping, ObjectMapping, Subobject};
use crate::query::value::{binding, Binding, Value};
use crate::query::{Join, Query};
use crate::result::{Outcome, Problem};
use crate::schema::Schema;
use crate::{execute_query, Env};

mod testkit;

pub const MOVIE_ID: &str = "6a7837fc-b463-4d32-b628-0f4b3065cb21";

const SDL: &str = r#"
    type Query {
      movie(id: ID!): Movie
      movies: [Movie!]!
      foo: Foo
      bar: Bar
    }

    type Movie {
      id: ID!
      title: String!
      genre: Genre!
      releaseYear: Int!
    }

    enum Genre { DRAMA ACTION COMEDY }

    type Foo { value: Int! }

    type Bar { message: String! }
"#;

pub fn schema() -> Arc<Schema> {
    match crate::schema::from_sdl(SDL) {
        Outcome::Success(schema) => schema,
        other => panic!("unexpected problems: {:?}", other.problems()),
    }
}

pub fn movies_json() -> Json {
    json!([
        {
            "id": MOVIE_ID,
            "title": "Celine et Julie Vont en Bateau",
            "genre": "COMEDY",
            "releaseYear": 1974
        },
        {
            "id": "f100b65d-76b4-4a6a-8c01-8c2e36482111",
            "title": "Duelle",
            "genre": "DRAMA",
            "releaseYear": 1976
        },
        {
            "id": "7e2b5d32-4c33-47a9-bb24-2a2e82a34b22",
            "title": "Noroit",
            "genre": "DRAMA",
            "releaseYear": 1976
        },
        {
            "id": "65e0b818-6d45-4b29-b2ce-f0e7b5e1df33",
            "title": "Le Pont du Nord",
            "genre": "DRAMA",
            "releaseYear": 1981
        }
    ])
}

fn movie_component(schema: Arc<Schema>) -> ValueComponent {
    ValueComponent::new(schema)
        .with_root_value("movies", movies_json())
        .with_root_resolver("movie", |args| {
            let Some(Value::String(id)) = binding(args, "id") else {
                return Outcome::failure(Problem::new("movie requires an id argument"));
            };
            let movies = movies_json();
            let found = movies
                .as_array()
                .unwrap()
                .iter()
                .find(|movie| movie["id"].as_str() == Some(id.as_str()))
                .cloned();
            Outcome::Success(found.unwrap_or(Json::Null))
        })
}

/// The composed engine: a root component owning no fields of its own, with
/// every root field claimed by a sub-component during completion.
pub fn mapping() -> Mapping {
    let schema = schema();
    let movies = movie_component(schema.clone()).to_boxed_arc();
    let foo = ValueComponent::new(schema.clone())
        .with_root_value("foo", json!({ "value": 23 }))
        .to_boxed_arc();
    let bar = ValueComponent::new(schema.clone())
        .with_root_value("bar", json!({ "message": "Hello world" }))
        .to_boxed_arc();
    let composed = ValueComponent::new(schema.clone()).to_boxed_arc();

    Mapping::new(schema)
        .with_object_mapping(
            ObjectMapping::new("Query", composed)
                .with_subobject(Subobject::new("movie", movies.clone()))
                .with_subobject(Subobject::new("movies", movies.clone()))
                .with_subobject(Subobject::new("foo", foo))
                .with_subobject(Subobject::new("bar", bar)),
        )
        .with_object_mapping(
            ObjectMapping::new("Movie", movies)
                .with_attribute("id")
                .with_attribute("title")
                .with_attribute("genre")
                .with_attribute("releaseYear"),
        )
}

pub fn leaf(name: &str) -> Query {
    Query::select(name, vec![], Query::Empty)
}

fn movie_by_id(child: Query) -> Query {
    Query::select(
        "movie",
        vec![Binding::new("id", Value::String(MOVIE_ID.to_string()))],
        child,
    )
}

fn rendered(response: &crate::QueryResponse) -> String {
    serde_json::to_string(response).unwrap()
}

#[test]
fn movie_by_id_resolves_through_the_movie_component() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let response = execute_query(&movie_by_id(leaf("title")), &mapping()).await;
        assert_eq!(
            rendered(&response),
            r#"{"data":{"movie":{"title":"Celine et Julie Vont en Bateau"}}}"#
        );
    });
}

#[test]
fn foo_resolves_through_the_foo_component() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let query = Query::select("foo", vec![], leaf("value"));
        let response = execute_query(&query, &mapping()).await;
        assert_eq!(rendered(&response), r#"{"data":{"foo":{"value":23}}}"#);
    });
}

#[test]
fn bar_resolves_through_the_bar_component() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let query = Query::select("bar", vec![], leaf("message"));
        let response = execute_query(&query, &mapping()).await;
        assert_eq!(
            rendered(&response),
            r#"{"data":{"bar":{"message":"Hello world"}}}"#
        );
    });
}

#[test]
fn sibling_root_fields_merge_across_components() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let query = movie_by_id(leaf("title"))
            .and(Query::select("foo", vec![], leaf("value")))
            .and(Query::select("bar", vec![], leaf("message")));
        let response = execute_query(&query, &mapping()).await;
        assert_eq!(
            rendered(&response),
            concat!(
                r#"{"data":{"movie":{"title":"Celine et Julie Vont en Bateau"},"#,
                r#""foo":{"value":23},"bar":{"message":"Hello world"}}}"#
            )
        );
    });
}

#[test]
fn root_fields_can_be_renamed() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let query = Query::Rename("film".to_string(), Box::new(movie_by_id(leaf("title"))));
        let response = execute_query(&query, &mapping()).await;
        assert_eq!(
            rendered(&response),
            r#"{"data":{"film":{"title":"Celine et Julie Vont en Bateau"}}}"#
        );
    });
}

#[test]
fn unknown_field_is_an_unclaimed_deferral() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let response = execute_query(&movie_by_id(leaf("nope")), &mapping()).await;
        assert_eq!(response.data, Some(json!({ "movie": { "nope": null } })));
        assert_eq!(response.errors.len(), 1);
        assert_eq!(
            response.errors[0].message,
            "No component claims field 'nope' of type Movie"
        );
        assert_eq!(
            response.errors[0].path,
            Some(vec!["movie".to_string(), "nope".to_string()])
        );
    });
}

#[test]
fn unclaimed_root_field_is_reported_with_its_path() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let schema = schema();
        let composed = ValueComponent::new(schema.clone()).to_boxed_arc();
        let lonely = Mapping::new(schema)
            .with_object_mapping(ObjectMapping::new("Query", composed));
        let response = execute_query(&Query::select("foo", vec![], leaf("value")), &lonely).await;
        assert_eq!(response.data, Some(json!({ "foo": null })));
        assert_eq!(
            response.errors[0].message,
            "No component claims field 'foo' of type Query"
        );
        assert_eq!(response.errors[0].path, Some(vec!["foo".to_string()]));
    });
}

#[test]
fn malformed_root_query_is_rejected() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let response = execute_query(&Query::Unique(Box::new(leaf("movies"))), &mapping()).await;
        assert!(response.data.is_none());
        assert_eq!(
            response.errors[0].message,
            "Malformed query: root query must be a field selection"
        );
    });
}

#[test]
fn subobject_joins_rewrite_the_deferred_query() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let schema = schema();
        let movies = movie_component(schema.clone()).to_boxed_arc();
        let composed = ValueComponent::new(schema.clone()).to_boxed_arc();
        let join = Join::new(|_, query| {
            let Some((name, _, args, child)) = crate::query::normalize::select_parts(query) else {
                return Outcome::failure(Problem::new("expected a select at the boundary"));
            };
            Outcome::Success(Query::select(
                name,
                args.to_vec(),
                Query::Limit(2, Box::new(child.clone())),
            ))
        });
        let mapping = Mapping::new(schema).with_object_mapping(
            ObjectMapping::new("Query", composed)
                .with_subobject(Subobject::new("movies", movies).with_join(join)),
        );
        let response =
            execute_query(&Query::select("movies", vec![], leaf("title")), &mapping).await;
        assert_eq!(
            response.data,
            Some(json!({
                "movies": [
                    { "title": "Celine et Julie Vont en Bateau" },
                    { "title": "Duelle" }
                ]
            }))
        );
    });
}

#[test]
fn introspection_runs_alongside_data_selections() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let schema = schema();
        let introspect = Query::Introspect(
            schema,
            Box::new(Query::select(
                "__schema",
                vec![],
                Query::select("queryType", vec![], leaf("name")),
            )),
        );
        let query = introspect.and(Query::select("foo", vec![], leaf("value")));
        let response = execute_query(&query, &mapping()).await;
        assert_eq!(
            response.data,
            Some(json!({
                "__schema": { "queryType": { "name": "Query" } },
                "foo": { "value": 23 }
            }))
        );
        assert!(response.errors.is_empty());
    });
}

#[test]
fn schema_typo_is_surfaced_as_a_validation_problem() {
    let outcome = crate::schema::from_sdl(
        r#"
        type Query { episode: Episod }
        type Episode { name: String! }
        "#,
    );
    match outcome {
        Outcome::Warnings(problems, schema) => {
            assert_eq!(problems.len(), 1);
            assert_eq!(problems[0].message, "Reference to undefined type: Episod");
            assert!(schema.type_def("Episode").is_some());
        }
        other => panic!("expected a salvaged schema, got {:?}", other.problems()),
    }
}

#[test]
fn environment_frames_are_invisible_in_the_output() {
    testkit::init_logger();
    tokio_test::block_on(async {
        let query = Query::select(
            "foo",
            vec![],
            Query::Environment(Env::one("stage", 2i64), Box::new(leaf("value"))),
        );
        let response = execute_query(&query, &mapping()).await;
        assert_eq!(rendered(&response), r#"{"data":{"foo":{"value":23}}}"#);
    });
}
