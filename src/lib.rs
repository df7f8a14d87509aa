//! A GraphQL query execution core built around three pieces: a tagged query
//! algebra whose normalization determines correctness, a cursor protocol
//! abstracting the application data model as a typed tree, and a two-phase
//! interpreter producing a proto-response whose deferred holes are completed
//! by other component interpreters. Component boundaries live inside the
//! algebra itself, so one query may span several back-end sub-engines.
//!
//! Consumers hand the engine an elaborated [`query::Query`], a validated
//! [`schema::Schema`] and a [`mapping::Mapping`] of object types to
//! component interpreters; [`execute_query`] returns the standard
//! `{ data, errors }` envelope.

use tracing::instrument;

pub mod components;
pub mod context;
pub mod cursor;
pub mod env;
pub mod interpreter;
pub mod mapping;
pub mod proto;
pub mod query;
pub mod response;
pub mod result;
pub mod schema;
pub mod utils;

pub use context::Context;
pub use cursor::{Cursor, CursorRef};
pub use env::Env;
pub use mapping::{ComponentInterpreter, FieldMapping, Mapping, ObjectMapping, Subobject};
pub use proto::ProtoJson;
pub use query::Query;
pub use response::QueryResponse;
pub use result::{ExecutionError, Location, Outcome, Problem};
pub use schema::{Schema, Type};

/// Run an elaborated query against a mapping and assemble the response
/// envelope.
#[instrument(level = "trace", skip_all)]
pub async fn execute_query(query: &Query, mapping: &Mapping) -> QueryResponse {
    let outcome = interpreter::run_root(query, mapping).await;
    QueryResponse::from_outcome(outcome)
}

#[cfg(test)]
mod tests;
