use std::collections::HashMap;

use crate::query::predicate::{OrderSelection, Predicate};
use crate::query::value::Binding;
use crate::query::Query;

/// Decompose a possibly-renamed select into
/// `(field name, result name, args, child)`.
pub fn select_parts(query: &Query) -> Option<(&str, &str, &[Binding], &Query)> {
    match query {
        Query::Select { name, args, child } => Some((name, name, args, child)),
        Query::Rename(result_name, inner) => match inner.as_ref() {
            Query::Select { name, args, child } => Some((name, result_name, args, child)),
            _ => None,
        },
        _ => None,
    }
}

/// The canonical form for emitted fields: a `Rename` around a `Select`, or
/// a bare `Select` emitting under its own name.
pub fn as_renamed_select(query: &Query) -> Option<(&str, &Query)> {
    match query {
        Query::Select { name, .. } => Some((name.as_str(), query)),
        Query::Rename(result_name, inner) => match inner.as_ref() {
            Query::Select { .. } => Some((result_name.as_str(), inner)),
            _ => None,
        },
        _ => None,
    }
}

/// Normalize a list of sibling queries: empties dropped, one level of
/// groups flattened, and selects sharing a `(field, result)` pair merged
/// into one select with their children merged recursively. When duplicated
/// selects disagree on arguments the first non-empty argument list wins.
pub fn merge_queries(queries: Vec<Query>) -> Query {
    let mut flattened = vec![];
    for query in queries {
        match query {
            Query::Empty => {}
            Query::Group(items) => {
                flattened.extend(items.into_iter().filter(|item| !item.is_empty()))
            }
            other => flattened.push(other),
        }
    }

    let mut others = vec![];
    let mut order: Vec<(String, String)> = vec![];
    let mut grouped: HashMap<(String, String), Vec<Query>> = HashMap::new();
    for query in flattened {
        match select_parts(&query) {
            Some((name, result_name, _, _)) => {
                let key = (name.to_string(), result_name.to_string());
                if !grouped.contains_key(&key) {
                    order.push(key.clone());
                }
                grouped.entry(key).or_default().push(query);
            }
            None => others.push(query),
        }
    }

    let mut items = others;
    for key in order {
        let group = grouped.remove(&key).expect("keyed during partition");
        items.push(merge_select_group(key, group));
    }

    match items.len() {
        0 => Query::Empty,
        1 => items.pop().expect("length checked"),
        _ => Query::Group(items),
    }
}

fn merge_select_group((name, result_name): (String, String), group: Vec<Query>) -> Query {
    let mut args: Vec<Binding> = vec![];
    let mut children = vec![];
    for query in group {
        let select = match query {
            Query::Rename(_, inner) => *inner,
            other => other,
        };
        if let Query::Select {
            args: select_args,
            child,
            ..
        } = select
        {
            if args.is_empty() && !select_args.is_empty() {
                args = select_args;
            }
            children.push(*child);
        }
    }
    let select = Query::select(name.clone(), args, merge_queries(children));
    if result_name == name {
        select
    } else {
        Query::Rename(result_name, Box::new(select))
    }
}

/// Build a select tree covering the union of the given field-name paths:
/// one-element paths become leaf selects, longer paths are grouped by head
/// and recursed on their tails.
pub fn mk_path_query(paths: &[Vec<String>]) -> Vec<Query> {
    let mut queries: Vec<Query> = paths
        .iter()
        .filter(|path| path.len() == 1)
        .map(|path| Query::select(path[0].clone(), vec![], Query::Empty))
        .collect();

    let mut heads: Vec<&str> = vec![];
    let mut tails: HashMap<&str, Vec<Vec<String>>> = HashMap::new();
    for path in paths.iter().filter(|path| path.len() > 1) {
        let head = path[0].as_str();
        if !tails.contains_key(head) {
            heads.push(head);
        }
        tails.entry(head).or_default().push(path[1..].to_vec());
    }
    for head in heads {
        let suffixes = tails.remove(head).expect("keyed during grouping");
        queries.push(Query::select(
            head,
            vec![],
            merge_queries(mk_path_query(&suffixes)),
        ));
    }
    queries
}

/// The normalized slice-plus-predicate shape
/// `Limit(Offset(OrderBy(Filter(child))))` with every layer optional,
/// recognized so that back-ends can push the whole shape down at once.
#[derive(Debug)]
pub struct SliceShape<'a> {
    pub filter: Option<&'a Predicate>,
    pub order_by: Option<&'a [OrderSelection]>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    pub child: &'a Query,
}

pub fn filter_order_by_limit(query: &Query) -> Option<SliceShape<'_>> {
    let mut current = query;
    let mut limit = None;
    let mut offset = None;
    let mut order_by = None;
    let mut filter = None;
    if let Query::Limit(n, child) = current {
        limit = Some(*n);
        current = child;
    }
    if let Query::Offset(n, child) = current {
        offset = Some(*n);
        current = child;
    }
    if let Query::OrderBy(selections, child) = current {
        order_by = Some(selections.as_slice());
        current = child;
    }
    if let Query::Filter(predicate, child) = current {
        filter = Some(predicate);
        current = child;
    }
    if limit.is_none() && offset.is_none() && order_by.is_none() && filter.is_none() {
        None
    } else {
        Some(SliceShape {
            filter,
            order_by,
            offset,
            limit,
            child: current,
        })
    }
}
