use futures::future::BoxFuture;
use serde_json::Value as Json;
use tracing::{instrument, trace};

use crate::cursor::{Cursor, CursorRef};
use crate::mapping::Mapping;
use crate::proto::ProtoJson;
use crate::query::normalize::select_parts;
use crate::query::{Join, Query};
use crate::response::insert_merged;
use crate::result::{ExecutionError, Outcome, Problem};
use crate::schema::{Type, TypeKind};

/// Run a root query against a mapping: each root field is resolved by the
/// root component, completed against the mapping, and merged into one data
/// object in query order.
#[instrument(level = "trace", skip_all)]
pub async fn run_root(query: &Query, mapping: &Mapping) -> Outcome<Json> {
    let Some(interpreter) = mapping.root_interpreter() else {
        return Outcome::failure(Problem::new(format!(
            "No object mapping for query root type {}",
            mapping.schema.query_type
        )));
    };
    let roots: Vec<&Query> = match query {
        Query::Group(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut problems = vec![];
    let mut data = serde_json::Map::new();
    for root in roots {
        if let Query::Introspect(schema, child) = root {
            let (more, proto) = crate::components::introspection::run(schema, child).into_parts();
            problems.extend(more);
            if let Some(proto) = proto {
                let (more, json) = complete(proto, mapping).await.into_parts();
                problems.extend(more);
                if let Some(Json::Object(fields)) = json {
                    for (name, value) in fields {
                        insert_merged(&mut data, name, value);
                    }
                }
            }
            continue;
        }
        let Some((_, result_name, _, _)) = select_parts(root) else {
            problems.push(Problem::from(ExecutionError::MalformedQuery {
                reason: "root query must be a field selection".to_string(),
            }));
            continue;
        };
        trace!(field = %result_name, "running root field");
        let (more, proto) = interpreter.run_root_value(root).await.into_parts();
        problems.extend(more);
        let Some(proto) = proto else {
            data.insert(result_name.to_string(), Json::Null);
            continue;
        };
        let (more, json) = complete(proto, mapping).await.into_parts();
        problems.extend(more);
        insert_merged(
            &mut data,
            result_name.to_string(),
            json.unwrap_or(Json::Null),
        );
    }
    Outcome::warnings(problems, Json::Object(data))
}

/// Resolve a selection against an object-typed cursor, yielding
/// `(result name, value)` pairs in query order. A field the cursor cannot
/// supply becomes a deferred hole for the mapping to claim later.
pub fn run_fields(
    query: &Query,
    tpe: &Type,
    cursor: &dyn Cursor,
) -> Outcome<Vec<(String, ProtoJson)>> {
    if let Some((name, result_name, _, child)) = select_parts(query) {
        if tpe.is_nullable() && cursor.is_nullable() {
            return cursor.as_nullable().and_then(|inner| match inner {
                None => Outcome::Success(vec![(result_name.to_string(), ProtoJson::null())]),
                Some(inner) => run_fields(query, tpe.non_null(), inner.as_ref()),
            });
        }
        if !cursor.has_field(name) {
            return Outcome::Success(vec![(
                result_name.to_string(),
                ProtoJson::Deferred {
                    cursor: cursor.to_ref(),
                    tpe: tpe.clone(),
                    field_name: name.to_string(),
                    query: query.clone(),
                },
            )]);
        }
        return cursor.field(name, Some(result_name)).and_then(|field_cursor| {
            let field_tpe = field_cursor.tpe().clone();
            run_value(child, &field_tpe, field_cursor.as_ref())
                .at_path(&field_cursor.context().problem_path())
                .map(|value| vec![(result_name.to_string(), value)])
        });
    }

    match query {
        Query::Group(children) => {
            Outcome::gather(children.iter().map(|child| run_fields(child, tpe, cursor)))
                .map(|nested| nested.into_iter().flatten().collect())
        }
        Query::Narrow(subtpe, child) => {
            if cursor.narrows_to(subtpe) {
                cursor.narrow(subtpe).and_then(|narrowed| {
                    let narrowed_tpe = narrowed.tpe().clone();
                    run_fields(child, &narrowed_tpe, narrowed.as_ref())
                })
            } else {
                Outcome::Success(vec![])
            }
        }
        Query::Skip { sense, cond, child } => {
            if cond == sense {
                Outcome::Success(vec![])
            } else {
                run_fields(child, tpe, cursor)
            }
        }
        Query::Environment(env, child) => {
            let scoped = cursor.with_env(env.clone());
            run_fields(child, tpe, scoped.as_ref())
        }
        Query::Wrap(name, child) => run_value(child, tpe, cursor)
            .map(|value| vec![(name.clone(), value)]),
        Query::Count(name, child) => elements_of(child, cursor)
            .map(|elements| vec![(name.clone(), ProtoJson::Pure(elements.len().into()))]),
        Query::Component { .. } | Query::Defer { .. } => {
            match cursor.context().result_path.first().cloned() {
                Some(name) => {
                    run_value(query, tpe, cursor).map(|value| vec![(name, value)])
                }
                None => malformed("component boundary outside any field", cursor),
            }
        }
        Query::Introspect(schema, child) => {
            crate::components::introspection::run(schema, child).and_then(|proto| match proto {
                ProtoJson::Pure(Json::Object(fields)) => Outcome::Success(
                    fields
                        .into_iter()
                        .map(|(name, value)| (name, ProtoJson::Pure(value)))
                        .collect(),
                ),
                other => Outcome::Success(vec![("__schema".to_string(), other)]),
            })
        }
        Query::Empty | Query::Skipped => Outcome::Success(vec![]),
        Query::UntypedNarrow(name, _) => malformed(
            &format!("narrow to '{}' must be elaborated before interpretation", name),
            cursor,
        ),
        _ => malformed("unexpected query shape in field position", cursor),
    }
}

/// Resolve a query against a cursor by the type at that position.
pub fn run_value(query: &Query, tpe: &Type, cursor: &dyn Cursor) -> Outcome<ProtoJson> {
    match query {
        Query::Environment(env, child) => {
            let scoped = cursor.with_env(env.clone());
            run_value(child, tpe, scoped.as_ref())
        }
        Query::Skip { sense, cond, child } => {
            if cond == sense {
                Outcome::Success(ProtoJson::null())
            } else {
                run_value(child, tpe, cursor)
            }
        }
        Query::Wrap(name, child) => run_value(child, tpe, cursor)
            .map(|value| ProtoJson::from_fields(vec![(name.clone(), value)])),
        Query::Narrow(subtpe, child) => {
            // Wrappers unwrap first so that narrowing applies per element.
            if cursor.is_list() || cursor.is_nullable() {
                run_typed(query, tpe, cursor)
            } else if cursor.narrows_to(subtpe) {
                cursor.narrow(subtpe).and_then(|narrowed| {
                    let narrowed_tpe = narrowed.tpe().clone();
                    run_value(child, &narrowed_tpe, narrowed.as_ref())
                })
            } else {
                Outcome::Success(ProtoJson::null())
            }
        }
        Query::Component { join, child, .. } => defer_to(cursor, join, child, None),
        Query::Defer {
            join,
            child,
            root_tpe,
        } => defer_to(cursor, join, child, Some(root_tpe.clone())),
        Query::Introspect(schema, child) => crate::components::introspection::run(schema, child),
        Query::GroupList(queries) => Outcome::all(
            queries.iter().map(|child| run_value(child, tpe, cursor)),
        )
        .map(ProtoJson::from_values),
        Query::Unique(child) => {
            apply_transforms(child, cursor).and_then(|(elements, residual)| {
                match elements.len() {
                    0 => {
                        if tpe.is_nullable() {
                            Outcome::Success(ProtoJson::null())
                        } else {
                            ExecutionError::EmptyResult.into()
                        }
                    }
                    1 => {
                        let element = &elements[0];
                        let element_tpe = element.tpe().clone();
                        run_value(residual, &element_tpe, element.as_ref())
                    }
                    count => ExecutionError::TooManyResults { count }.into(),
                }
            })
        }
        Query::Filter(..) | Query::OrderBy(..) | Query::Limit(..) | Query::Offset(..) => {
            apply_transforms(query, cursor).and_then(|(elements, residual)| {
                Outcome::all(elements.iter().map(|element| {
                    let element_tpe = element.tpe().clone();
                    run_value(residual, &element_tpe, element.as_ref())
                }))
                .map(ProtoJson::from_values)
            })
        }
        Query::Count(name, child) => elements_of(child, cursor).map(|elements| {
            ProtoJson::from_fields(vec![(
                name.clone(),
                ProtoJson::Pure(elements.len().into()),
            )])
        }),
        Query::UntypedNarrow(name, _) => malformed(
            &format!("narrow to '{}' must be elaborated before interpretation", name),
            cursor,
        ),
        Query::Skipped => Outcome::Success(ProtoJson::null()),
        _ => run_typed(query, tpe, cursor),
    }
}

fn run_typed(query: &Query, tpe: &Type, cursor: &dyn Cursor) -> Outcome<ProtoJson> {
    match tpe {
        Type::Nullable(inner) => {
            if cursor.is_nullable() {
                cursor.as_nullable().and_then(|unwrapped| match unwrapped {
                    None => Outcome::Success(ProtoJson::null()),
                    Some(unwrapped) => run_value(query, inner, unwrapped.as_ref()),
                })
            } else {
                run_value(query, inner, cursor)
            }
        }
        Type::Ref(_) => cursor
            .context()
            .schema
            .resolve(tpe)
            .at_path(&cursor.context().problem_path())
            .and_then(|resolved| run_value(query, &resolved, cursor)),
        Type::List(item) => cursor.as_list().and_then(|items| {
            Outcome::all(
                items
                    .iter()
                    .map(|item_cursor| run_value(query, item, item_cursor.as_ref())),
            )
            .map(ProtoJson::from_values)
        }),
        Type::Named(def) => match &def.kind {
            TypeKind::Scalar | TypeKind::Enum { .. } => cursor
                .as_leaf()
                .at_path(&cursor.context().problem_path())
                .map(ProtoJson::Pure),
            TypeKind::Object { .. } | TypeKind::Interface { .. } | TypeKind::Union { .. } => {
                run_fields(query, tpe, cursor).map(ProtoJson::from_fields)
            }
            TypeKind::InputObject { .. } => Outcome::Failure(vec![Problem::from(
                ExecutionError::UnsupportedType {
                    type_name: def.name.clone(),
                },
            )
            .with_path(cursor.context().problem_path())]),
        },
    }
}

/// Peel the list transformations layered over a child query, applying them
/// inside-out to the cursor's elements: filter, then order, then offset,
/// then limit. Returns the surviving element cursors and the continuation
/// query to run against each.
fn apply_transforms<'q>(
    query: &'q Query,
    cursor: &dyn Cursor,
) -> Outcome<(Vec<CursorRef>, &'q Query)> {
    match query {
        Query::Filter(predicate, child) => {
            apply_transforms(child, cursor).and_then(|(elements, residual)| {
                Outcome::all(
                    elements
                        .iter()
                        .map(|element| predicate.eval(element.as_ref())),
                )
                .map(|verdicts| {
                    let retained = elements
                        .into_iter()
                        .zip(verdicts)
                        .filter_map(|(element, keep)| keep.then_some(element))
                        .collect();
                    (retained, residual)
                })
            })
        }
        Query::OrderBy(selections, child) => {
            apply_transforms(child, cursor).and_then(|(elements, residual)| {
                let keys = Outcome::all(elements.iter().map(|element| {
                    Outcome::all(
                        selections
                            .iter()
                            .map(|selection| {
                                crate::query::predicate::leaf_at(element.as_ref(), &selection.path)
                            }),
                    )
                }));
                keys.map(|keys| {
                    let mut indexed: Vec<(Vec<Option<Json>>, CursorRef)> =
                        keys.into_iter().zip(elements).collect();
                    indexed.sort_by(|(left, _), (right, _)| {
                        selections
                            .iter()
                            .zip(left.iter().zip(right.iter()))
                            .map(|(selection, (l, r))| selection.compare_keys(l, r))
                            .find(|ordering| !ordering.is_eq())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    });
                    (
                        indexed.into_iter().map(|(_, element)| element).collect(),
                        residual,
                    )
                })
            })
        }
        Query::Offset(n, child) => {
            apply_transforms(child, cursor).and_then(|(elements, residual)| {
                if *n < 0 {
                    return ExecutionError::NegativeBound {
                        op: "offset",
                        value: *n,
                    }
                    .into();
                }
                Outcome::Success((
                    elements.into_iter().skip(*n as usize).collect(),
                    residual,
                ))
            })
        }
        Query::Limit(n, child) => {
            apply_transforms(child, cursor).and_then(|(elements, residual)| {
                if *n < 0 {
                    return ExecutionError::NegativeBound {
                        op: "limit",
                        value: *n,
                    }
                    .into();
                }
                Outcome::Success((
                    elements.into_iter().take(*n as usize).collect(),
                    residual,
                ))
            })
        }
        other => cursor
            .as_list()
            .at_path(&cursor.context().problem_path())
            .map(|elements| (elements, other)),
    }
}

/// The elements a counting query ranges over: follow selects down to the
/// terminal position, then expand it nullable-transparently.
fn elements_of(query: &Query, cursor: &dyn Cursor) -> Outcome<Vec<CursorRef>> {
    match select_parts(query) {
        Some((name, _, _, child)) => cursor
            .nullable_field(name)
            .and_then(|field_cursor| elements_of(child, field_cursor.as_ref())),
        None => match query {
            Query::Empty | Query::Skipped => expand(cursor),
            _ => apply_transforms(query, cursor).map(|(elements, _)| elements),
        },
    }
}

fn expand(cursor: &dyn Cursor) -> Outcome<Vec<CursorRef>> {
    if cursor.is_nullable() {
        cursor.as_nullable().and_then(|inner| match inner {
            None => Outcome::Success(vec![]),
            Some(inner) => expand(inner.as_ref()),
        })
    } else if cursor.is_list() {
        cursor.as_list()
    } else {
        Outcome::Success(vec![cursor.to_ref()])
    }
}

/// Emit the hole marking a hand-off to another interpreter. The deferred
/// query is re-anchored under the boundary field when the join did not
/// already produce a root-shaped select.
fn defer_to(
    cursor: &dyn Cursor,
    join: &Join,
    child: &Query,
    root_tpe: Option<Type>,
) -> Outcome<ProtoJson> {
    let Some(field_name) = cursor.context().path.first().cloned() else {
        return malformed("component boundary outside any field", cursor);
    };
    let owner_tpe = root_tpe.unwrap_or_else(|| {
        cursor
            .parent()
            .map(|parent| parent.tpe().clone())
            .unwrap_or_else(|| cursor.tpe().clone())
    });
    join.apply(cursor, child).map(|joined| {
        let query = if select_parts(&joined).is_some() {
            joined
        } else {
            Query::select(field_name.clone(), vec![], joined)
        };
        ProtoJson::Deferred {
            cursor: cursor.to_ref(),
            tpe: owner_tpe,
            field_name,
            query,
        }
    })
}

fn malformed<T>(reason: &str, cursor: &dyn Cursor) -> Outcome<T> {
    Outcome::Failure(vec![Problem::from(ExecutionError::MalformedQuery {
        reason: reason.to_string(),
    })
    .with_path(cursor.context().problem_path())])
}

/// Second phase: resolve every deferred hole by handing its query to the
/// component claiming the `(type, field)` pair, then reduce to JSON.
/// Completion is total: an unclaimed hole becomes a problem carrying the
/// field's response path.
pub fn complete<'a>(proto: ProtoJson, mapping: &'a Mapping) -> BoxFuture<'a, Outcome<Json>> {
    Box::pin(async move {
        match proto {
            ProtoJson::Pure(json) => Outcome::Success(json),
            ProtoJson::Object(fields) => {
                let mut problems = vec![];
                let mut object = serde_json::Map::with_capacity(fields.len());
                for (name, value) in fields {
                    let (more, json) = complete(value, mapping).await.into_parts();
                    problems.extend(more);
                    insert_merged(&mut object, name, json.unwrap_or(Json::Null));
                }
                Outcome::warnings(problems, Json::Object(object))
            }
            ProtoJson::Array(values) => {
                let mut problems = vec![];
                let mut array = Vec::with_capacity(values.len());
                for value in values {
                    let (more, json) = complete(value, mapping).await.into_parts();
                    problems.extend(more);
                    array.push(json.unwrap_or(Json::Null));
                }
                Outcome::warnings(problems, Json::Array(array))
            }
            ProtoJson::Deferred {
                cursor,
                tpe,
                field_name,
                query,
            } => {
                let type_name = tpe.underlying().name();
                let prefix = cursor.context().problem_path();
                let hole_path = {
                    let mut path = prefix.clone();
                    let result_name = select_parts(&query)
                        .map(|(_, result_name, _, _)| result_name.to_string())
                        .unwrap_or_else(|| field_name.clone());
                    path.push(result_name);
                    path
                };
                let Some(subobject) = mapping.subobject(&type_name, &field_name) else {
                    trace!(tpe = %type_name, field = %field_name, "no component claims deferred field");
                    return Outcome::Failure(vec![Problem::from(
                        ExecutionError::UnresolvedDeferral {
                            field_name,
                            type_name,
                        },
                    )
                    .with_path(hole_path)]);
                };
                let (mut problems, joined) =
                    subobject.join.apply(cursor.as_ref(), &query).into_parts();
                let Some(joined) = joined else {
                    return Outcome::Failure(prefixed(problems, &prefix, &hole_path));
                };
                let (more, resolved) = subobject.component.run_root_value(&joined).await.into_parts();
                problems.extend(more);
                let Some(resolved) = resolved else {
                    return Outcome::Failure(prefixed(problems, &prefix, &hole_path));
                };
                if let ProtoJson::Deferred {
                    tpe: next_tpe,
                    field_name: next_field,
                    ..
                } = &resolved
                {
                    if next_tpe.underlying().name() == type_name && *next_field == field_name {
                        problems.push(
                            Problem::from(ExecutionError::UnresolvedDeferral {
                                field_name,
                                type_name,
                            })
                            .with_path(hole_path),
                        );
                        return Outcome::Failure(problems);
                    }
                }
                let (more, json) = complete(resolved, mapping).await.into_parts();
                problems.extend(more);
                let problems = prefixed(problems, &prefix, &hole_path);
                match json {
                    Some(json) => Outcome::warnings(problems, json),
                    None => Outcome::Failure(problems),
                }
            }
        }
    })
}

/// Re-root problem paths reported by a sub-interpreter under the position
/// of the hole it was completing.
fn prefixed(problems: Vec<Problem>, prefix: &[String], hole_path: &[String]) -> Vec<Problem> {
    problems
        .into_iter()
        .map(|problem| match problem.path {
            Some(path) => {
                let mut full = prefix.to_vec();
                full.extend(path);
                Problem {
                    path: Some(full),
                    ..problem
                }
            }
            None => problem.with_path(hole_path.to_vec()),
        })
        .collect()
}
