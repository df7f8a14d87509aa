use std::cmp::Ordering;
use std::fmt::Display;

use serde_json::Value as Json;

use crate::cursor::Cursor;
use crate::query::value::Value;
use crate::result::{ExecutionError, Outcome};

/// A field-name path from the current position to a leaf, transparent to
/// nullable wrappers.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldPath(pub Vec<String>);

impl FieldPath {
    pub fn new<I, S>(names: I) -> FieldPath
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldPath(names.into_iter().map(Into::into).collect())
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Predicates over cursors, evaluated per element by `Filter`.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Const(bool),
    Eql(FieldPath, Value),
    NEql(FieldPath, Value),
    Lt(FieldPath, Value),
    LtEq(FieldPath, Value),
    Gt(FieldPath, Value),
    GtEq(FieldPath, Value),
    In(FieldPath, Vec<Value>),
    IsNull(FieldPath, bool),
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn eval(&self, cursor: &dyn Cursor) -> Outcome<bool> {
        match self {
            Predicate::Const(value) => Outcome::Success(*value),
            Predicate::Eql(path, value) => {
                leaf_at(cursor, path).map(|leaf| equals(leaf.as_ref(), value))
            }
            Predicate::NEql(path, value) => {
                leaf_at(cursor, path).map(|leaf| !equals(leaf.as_ref(), value))
            }
            Predicate::Lt(path, value) => ordered(cursor, path, value, Ordering::is_lt),
            Predicate::LtEq(path, value) => ordered(cursor, path, value, Ordering::is_le),
            Predicate::Gt(path, value) => ordered(cursor, path, value, Ordering::is_gt),
            Predicate::GtEq(path, value) => ordered(cursor, path, value, Ordering::is_ge),
            Predicate::In(path, values) => leaf_at(cursor, path)
                .map(|leaf| values.iter().any(|value| equals(leaf.as_ref(), value))),
            Predicate::IsNull(path, expected) => {
                leaf_at(cursor, path).map(|leaf| leaf.is_none() == *expected)
            }
            Predicate::And(left, right) => left
                .eval(cursor)
                .and_then(|l| right.eval(cursor).map(|r| l && r)),
            Predicate::Or(left, right) => left
                .eval(cursor)
                .and_then(|l| right.eval(cursor).map(|r| l || r)),
            Predicate::Not(inner) => inner.eval(cursor).map(|value| !value),
        }
    }
}

impl Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Const(value) => write!(f, "{}", value),
            Predicate::Eql(path, value) => write!(f, "{} = {}", path, value),
            Predicate::NEql(path, value) => write!(f, "{} != {}", path, value),
            Predicate::Lt(path, value) => write!(f, "{} < {}", path, value),
            Predicate::LtEq(path, value) => write!(f, "{} <= {}", path, value),
            Predicate::Gt(path, value) => write!(f, "{} > {}", path, value),
            Predicate::GtEq(path, value) => write!(f, "{} >= {}", path, value),
            Predicate::In(path, values) => {
                let rendered: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} in [{}]", path, rendered.join(", "))
            }
            Predicate::IsNull(path, true) => write!(f, "{} is null", path),
            Predicate::IsNull(path, false) => write!(f, "{} is not null", path),
            Predicate::And(left, right) => write!(f, "({} && {})", left, right),
            Predicate::Or(left, right) => write!(f, "({} || {})", left, right),
            Predicate::Not(inner) => write!(f, "!({})", inner),
        }
    }
}

/// One sort key of an `OrderBy`: the leaf to compare, the direction, and
/// where absent values collate.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderSelection {
    pub path: FieldPath,
    pub ascending: bool,
    pub nulls_last: bool,
}

impl OrderSelection {
    pub fn asc(path: FieldPath) -> OrderSelection {
        OrderSelection {
            path,
            ascending: true,
            nulls_last: true,
        }
    }

    pub fn desc(path: FieldPath) -> OrderSelection {
        OrderSelection {
            path,
            ascending: false,
            nulls_last: true,
        }
    }

    pub fn nulls_first(mut self) -> OrderSelection {
        self.nulls_last = false;
        self
    }

    pub fn compare(&self, left: &dyn Cursor, right: &dyn Cursor) -> Outcome<Ordering> {
        leaf_at(left, &self.path).and_then(|l| {
            leaf_at(right, &self.path).map(|r| self.compare_keys(&l, &r))
        })
    }

    /// Ordering of two already-extracted sort keys, honoring direction and
    /// nulls placement. Incomparable keys collate as equal, keeping the
    /// sort stable.
    pub fn compare_keys(&self, left: &Option<Json>, right: &Option<Json>) -> Ordering {
        match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => {
                if self.nulls_last {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (Some(_), None) => {
                if self.nulls_last {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (Some(left), Some(right)) => {
                let ordering = compare_json(left, right).unwrap_or(Ordering::Equal);
                if self.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            }
        }
    }
}

impl Display for OrderSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}",
            self.path,
            if self.ascending { "asc" } else { "desc" }
        )?;
        if !self.nulls_last {
            write!(f, " nulls first")?;
        }
        Ok(())
    }
}

/// Resolve a path to its leaf value, yielding `None` when any step is an
/// absent nullable.
pub fn leaf_at(cursor: &dyn Cursor, path: &FieldPath) -> Outcome<Option<Json>> {
    let mut problems = vec![];
    let mut current = cursor.to_ref();
    for name in &path.0 {
        if current.is_nullable() {
            let (more, inner) = current.as_nullable().into_parts();
            problems.extend(more);
            match inner {
                Some(Some(next)) => current = next,
                Some(None) => return Outcome::warnings(problems, None),
                None => return Outcome::Failure(problems),
            }
        }
        let (more, next) = current.field(name, None).into_parts();
        problems.extend(more);
        match next {
            Some(next) => current = next,
            None => return Outcome::Failure(problems),
        }
    }
    if current.is_nullable() {
        let (more, inner) = current.as_nullable().into_parts();
        problems.extend(more);
        match inner {
            Some(Some(next)) => current = next,
            Some(None) => return Outcome::warnings(problems, None),
            None => return Outcome::Failure(problems),
        }
    }
    if !current.is_leaf() {
        problems.push(
            ExecutionError::TypeMismatch {
                expected: "a leaf type".to_string(),
                found: current.tpe().to_string(),
            }
            .into(),
        );
        return Outcome::Failure(problems);
    }
    let (more, json) = current.as_leaf().into_parts();
    problems.extend(more);
    match json {
        Some(json) => Outcome::warnings(problems, Some(json)),
        None => Outcome::Failure(problems),
    }
}

fn equals(leaf: Option<&Json>, value: &Value) -> bool {
    match leaf {
        None => matches!(value, Value::Null),
        Some(json) => *json == Json::from(value),
    }
}

fn ordered(
    cursor: &dyn Cursor,
    path: &FieldPath,
    value: &Value,
    accept: impl Fn(Ordering) -> bool,
) -> Outcome<bool> {
    leaf_at(cursor, path).map(|leaf| match leaf {
        None => false,
        Some(json) => compare_json(&json, &Json::from(value)).is_some_and(accept),
    })
}

/// Ordering over comparable JSON scalars; `None` for mixed or non-scalar
/// operands.
pub fn compare_json(left: &Json, right: &Json) -> Option<Ordering> {
    match (left, right) {
        (Json::Number(l), Json::Number(r)) => l.as_f64().partial_cmp(&r.as_f64()),
        (Json::String(l), Json::String(r)) => Some(l.cmp(r)),
        (Json::Bool(l), Json::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::value::Value;

    #[test]
    fn predicate_display() {
        let predicate = Predicate::And(
            Box::new(Predicate::Eql(
                FieldPath::new(["genre"]),
                Value::Enum("DRAMA".to_string()),
            )),
            Box::new(Predicate::Not(Box::new(Predicate::IsNull(
                FieldPath::new(["releaseDate"]),
                true,
            )))),
        );
        assert_eq!(
            predicate.to_string(),
            "(genre = DRAMA && !(releaseDate is null))"
        );
    }

    #[test]
    fn json_comparison_is_scalar_only() {
        assert_eq!(
            compare_json(&serde_json::json!(1), &serde_json::json!(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_json(&serde_json::json!("a"), &serde_json::json!(1)),
            None
        );
    }
}
