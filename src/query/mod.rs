use std::fmt::{Debug, Display, Formatter as FmtFormatter, Result as FmtResult};
use std::sync::Arc;

use crate::cursor::Cursor;
use crate::env::Env;
use crate::result::Outcome;
use crate::schema::{Schema, Type};
use crate::utils::pretty_display::{get_indent, PrettyDisplay};

pub mod normalize;
pub mod predicate;
pub mod value;

use predicate::{OrderSelection, Predicate};
use value::Binding;

pub type JoinFn = dyn Fn(&dyn Cursor, &Query) -> Outcome<Query> + Send + Sync;

/// The hand-off transformation applied to a deferred subquery before it is
/// run by another interpreter; the default leaves the query unchanged.
#[derive(Clone, Default)]
pub struct Join(Option<Arc<JoinFn>>);

impl Join {
    pub fn new(
        f: impl Fn(&dyn Cursor, &Query) -> Outcome<Query> + Send + Sync + 'static,
    ) -> Join {
        Join(Some(Arc::new(f)))
    }

    pub fn apply(&self, cursor: &dyn Cursor, query: &Query) -> Outcome<Query> {
        match &self.0 {
            Some(f) => f(cursor, query),
            None => Outcome::Success(query.clone()),
        }
    }
}

impl Debug for Join {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        match self.0 {
            Some(_) => write!(f, "Join(..)"),
            None => write!(f, "Join(identity)"),
        }
    }
}

impl PartialEq for Join {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (None, None) => true,
            (Some(l), Some(r)) => Arc::ptr_eq(l, r),
            _ => false,
        }
    }
}

/// The query algebra: a tagged tree of transformations over the data model.
#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    /// Select field `name` with `args`, continue with `child`.
    Select {
        name: String,
        args: Vec<Binding>,
        child: Box<Query>,
    },
    /// Sibling queries combined at the same level.
    Group(Vec<Query>),
    /// Sibling queries collected as a list.
    GroupList(Vec<Query>),
    /// Expect exactly one element from a list-producing child.
    Unique(Box<Query>),
    /// Retain elements satisfying the predicate.
    Filter(Predicate, Box<Query>),
    /// Stable sort by the given selections.
    OrderBy(Vec<OrderSelection>, Box<Query>),
    Limit(i64, Box<Query>),
    Offset(i64, Box<Query>),
    /// Run `child` only when the focus narrows to `subtpe`.
    Narrow(Type, Box<Query>),
    /// Pre-elaboration narrowing by type name; replaced by `Narrow` before
    /// interpretation.
    UntypedNarrow(String, Box<Query>),
    /// `@skip`/`@include`: the child is dropped when `cond == sense`.
    Skip {
        sense: bool,
        cond: bool,
        child: Box<Query>,
    },
    /// Wrap the child's result in an object under `name`.
    Wrap(String, Box<Query>),
    /// Emit the child's field under a different result name.
    Rename(String, Box<Query>),
    /// Emit the number of elements the child produces, under `name`.
    Count(String, Box<Query>),
    /// Resolve the child against schema introspection.
    Introspect(Arc<Schema>, Box<Query>),
    /// Continue in the next stage of this interpreter.
    Defer {
        join: Join,
        child: Box<Query>,
        root_tpe: Type,
    },
    /// Continue in the interpreter of the named component.
    Component {
        component: String,
        join: Join,
        child: Box<Query>,
    },
    /// Extend the lexical environment for the child.
    Environment(Env, Box<Query>),
    Empty,
    /// Placeholder left by an eliminated node.
    Skipped,
}

impl Query {
    pub fn select(name: impl Into<String>, args: Vec<Binding>, child: Query) -> Query {
        Query::Select {
            name: name.into(),
            args,
            child: Box::new(child),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Query::Empty)
    }

    /// Combine two queries as siblings. Associative with identity `Empty`;
    /// flattens `Group` boundaries on both sides.
    pub fn and(self, other: Query) -> Query {
        match (self, other) {
            (Query::Empty, query) => query,
            (query, Query::Empty) => query,
            (Query::Group(mut left), Query::Group(right)) => {
                left.extend(right);
                Query::Group(left)
            }
            (Query::Group(mut left), right) => {
                left.push(right);
                Query::Group(left)
            }
            (left, Query::Group(right)) => {
                let mut items = Vec::with_capacity(right.len() + 1);
                items.push(left);
                items.extend(right);
                Query::Group(items)
            }
            (left, right) => Query::Group(vec![left, right]),
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut FmtFormatter<'_>) -> FmtResult {
        self.pretty_fmt(f, 0)
    }
}

impl PrettyDisplay for Query {
    fn pretty_fmt(&self, f: &mut FmtFormatter<'_>, depth: usize) -> FmtResult {
        match self {
            Query::Select { name, args, child } => {
                let header = if args.is_empty() {
                    format!("Select({})", name)
                } else {
                    let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    format!("Select({}, [{}])", name, rendered.join(", "))
                };
                block(f, depth, &header, std::slice::from_ref(child))
            }
            Query::Group(queries) => block_of(f, depth, "Group", queries),
            Query::GroupList(queries) => block_of(f, depth, "GroupList", queries),
            Query::Unique(child) => block(f, depth, "Unique", std::slice::from_ref(child)),
            Query::Filter(predicate, child) => block(
                f,
                depth,
                &format!("Filter({})", predicate),
                std::slice::from_ref(child),
            ),
            Query::OrderBy(selections, child) => {
                let rendered: Vec<String> = selections.iter().map(|s| s.to_string()).collect();
                block(
                    f,
                    depth,
                    &format!("OrderBy({})", rendered.join(", ")),
                    std::slice::from_ref(child),
                )
            }
            Query::Limit(n, child) => {
                block(f, depth, &format!("Limit({})", n), std::slice::from_ref(child))
            }
            Query::Offset(n, child) => {
                block(f, depth, &format!("Offset({})", n), std::slice::from_ref(child))
            }
            Query::Narrow(subtpe, child) => block(
                f,
                depth,
                &format!("Narrow({})", subtpe.name()),
                std::slice::from_ref(child),
            ),
            Query::UntypedNarrow(name, child) => block(
                f,
                depth,
                &format!("UntypedNarrow({})", name),
                std::slice::from_ref(child),
            ),
            Query::Skip { sense, cond, child } => block(
                f,
                depth,
                &format!("Skip({}, {})", sense, cond),
                std::slice::from_ref(child),
            ),
            Query::Wrap(name, child) => block(
                f,
                depth,
                &format!("Wrap({})", name),
                std::slice::from_ref(child),
            ),
            Query::Rename(name, child) => block(
                f,
                depth,
                &format!("Rename({})", name),
                std::slice::from_ref(child),
            ),
            Query::Count(name, child) => block(
                f,
                depth,
                &format!("Count({})", name),
                std::slice::from_ref(child),
            ),
            Query::Introspect(_, child) => {
                block(f, depth, "Introspect", std::slice::from_ref(child))
            }
            Query::Defer {
                child, root_tpe, ..
            } => block(
                f,
                depth,
                &format!("Defer({})", root_tpe.name()),
                std::slice::from_ref(child),
            ),
            Query::Component {
                component, child, ..
            } => block(
                f,
                depth,
                &format!("Component({})", component),
                std::slice::from_ref(child),
            ),
            Query::Environment(env, child) => block(
                f,
                depth,
                &format!("Environment({:?})", env),
                std::slice::from_ref(child),
            ),
            Query::Empty => writeln!(f, "{}Empty", get_indent(depth)),
            Query::Skipped => writeln!(f, "{}Skipped", get_indent(depth)),
        }
    }
}

fn block(
    f: &mut FmtFormatter<'_>,
    depth: usize,
    header: &str,
    children: &[Box<Query>],
) -> FmtResult {
    let visible: Vec<&Query> = children
        .iter()
        .map(|child| child.as_ref())
        .filter(|child| !child.is_empty())
        .collect();
    write_block(f, depth, header, &visible)
}

fn block_of(
    f: &mut FmtFormatter<'_>,
    depth: usize,
    header: &str,
    children: &[Query],
) -> FmtResult {
    let visible: Vec<&Query> = children.iter().filter(|child| !child.is_empty()).collect();
    write_block(f, depth, header, &visible)
}

fn write_block(
    f: &mut FmtFormatter<'_>,
    depth: usize,
    header: &str,
    children: &[&Query],
) -> FmtResult {
    let indent = get_indent(depth);
    if children.is_empty() {
        writeln!(f, "{}{}", indent, header)
    } else {
        writeln!(f, "{}{} {{", indent, header)?;
        for child in children {
            child.pretty_fmt(f, depth + 1)?;
        }
        writeln!(f, "{}}}", indent)
    }
}
