use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::context::Context;
use crate::env::Env;
use crate::result::{ExecutionError, Outcome};
use crate::schema::Type;

pub type CursorRef = Arc<dyn Cursor>;

/// A positioned, typed view into an application data model. Cursor is a
/// capability set: every back-end implements the primitive operations, and
/// the derived navigation below depends only on those primitives.
///
/// Contracts:
/// - the focus always satisfies `context().tpe`;
/// - `is_leaf` iff the type is a scalar or enum, `is_list` iff it is a
///   list, `is_nullable` iff it is nullable;
/// - `narrow` is defined only where `narrows_to` holds;
/// - a projected child's `parent` is the projecting cursor.
pub trait Cursor: Debug + Send + Sync {
    fn context(&self) -> &Context;
    fn env(&self) -> &Env;
    fn parent(&self) -> Option<&CursorRef>;
    fn focus(&self) -> &(dyn Any + Send + Sync);

    /// The same position with `env` pushed as a new lexical frame.
    fn with_env(&self, env: Env) -> CursorRef;

    /// This cursor as a shared reference, used by the derived combinators.
    fn to_ref(&self) -> CursorRef;

    fn tpe(&self) -> &Type {
        &self.context().tpe
    }

    fn is_leaf(&self) -> bool;
    fn as_leaf(&self) -> Outcome<Json>;
    fn is_list(&self) -> bool;
    fn as_list(&self) -> Outcome<Vec<CursorRef>>;
    fn is_nullable(&self) -> bool;
    fn as_nullable(&self) -> Outcome<Option<CursorRef>>;
    fn is_null(&self) -> bool;
    fn narrows_to(&self, subtpe: &Type) -> bool;
    fn narrow(&self, subtpe: &Type) -> Outcome<CursorRef>;
    fn has_field(&self, field_name: &str) -> bool;
    fn field(&self, field_name: &str, result_name: Option<&str>) -> Outcome<CursorRef>;

    fn nullable_has_field(&self, field_name: &str) -> bool {
        if self.is_nullable() {
            match self.as_nullable() {
                Outcome::Success(Some(inner)) | Outcome::Warnings(_, Some(inner)) => {
                    inner.nullable_has_field(field_name)
                }
                _ => false,
            }
        } else {
            self.has_field(field_name)
        }
    }

    /// `field`, transparent to a nullable wrapper. An absent value is a
    /// nullability violation at this position.
    fn nullable_field(&self, field_name: &str) -> Outcome<CursorRef> {
        if self.is_nullable() {
            self.as_nullable().and_then(|inner| match inner {
                Some(inner) => inner.nullable_field(field_name),
                None => Outcome::failure(ExecutionError::NullabilityViolation {
                    field_name: field_name.to_string(),
                }),
            })
        } else {
            self.field(field_name, None)
        }
    }

    fn has_path(&self, fns: &[&str]) -> bool {
        match fns.split_first() {
            None => true,
            Some((first, rest)) => {
                self.nullable_has_field(first)
                    && match self.nullable_field(first) {
                        Outcome::Success(child) | Outcome::Warnings(_, child) => {
                            child.has_path(rest)
                        }
                        Outcome::Failure(_) => false,
                    }
            }
        }
    }

    fn path(&self, fns: &[&str]) -> Outcome<CursorRef> {
        match fns.split_first() {
            None => Outcome::Success(self.to_ref()),
            Some((first, rest)) => self
                .nullable_field(first)
                .and_then(|child| child.path(rest)),
        }
    }

    fn has_list_path(&self, fns: &[&str]) -> bool {
        if fns.is_empty() {
            return true;
        }
        if self.is_nullable() {
            return match self.as_nullable() {
                Outcome::Success(Some(inner)) | Outcome::Warnings(_, Some(inner)) => {
                    inner.has_list_path(fns)
                }
                Outcome::Success(None) | Outcome::Warnings(_, None) => true,
                Outcome::Failure(_) => false,
            };
        }
        if self.is_list() {
            return match self.as_list() {
                Outcome::Success(items) | Outcome::Warnings(_, items) => {
                    items.iter().all(|item| item.has_list_path(fns))
                }
                Outcome::Failure(_) => false,
            };
        }
        let (first, rest) = (fns[0], &fns[1..]);
        self.has_field(first)
            && match self.field(first, None) {
                Outcome::Success(child) | Outcome::Warnings(_, child) => {
                    child.has_list_path(rest)
                }
                Outcome::Failure(_) => false,
            }
    }

    /// Fold along a field-name path, treating absent nullables as empty and
    /// flat-mapping across list segments. Yields the cursors at the
    /// terminal position.
    fn list_path(&self, fns: &[&str]) -> Outcome<Vec<CursorRef>> {
        if fns.is_empty() {
            return Outcome::Success(vec![self.to_ref()]);
        }
        if self.is_nullable() {
            return self.as_nullable().and_then(|inner| match inner {
                None => Outcome::Success(vec![]),
                Some(inner) => inner.list_path(fns),
            });
        }
        if self.is_list() {
            return self.as_list().and_then(|items| {
                Outcome::all(items.iter().map(|item| item.list_path(fns)))
                    .map(|nested| nested.into_iter().flatten().collect())
            });
        }
        let (first, rest) = (fns[0], &fns[1..]);
        self.field(first, None).and_then(|child| child.list_path(rest))
    }

    /// `list_path`, additionally flattening a list at the terminal position.
    fn flat_list_path(&self, fns: &[&str]) -> Outcome<Vec<CursorRef>> {
        self.list_path(fns).and_then(|cursors| {
            Outcome::all(cursors.into_iter().map(|cursor| {
                if cursor.is_nullable() {
                    cursor.as_nullable().and_then(|inner| match inner {
                        None => Outcome::Success(vec![]),
                        Some(inner) if inner.is_list() => inner.as_list(),
                        Some(inner) => Outcome::Success(vec![inner]),
                    })
                } else if cursor.is_list() {
                    cursor.as_list()
                } else {
                    Outcome::Success(vec![cursor])
                }
            }))
            .map(|nested| nested.into_iter().flatten().collect())
        })
    }
}

impl<'a> dyn Cursor + 'a {
    /// Typed focus extraction: a safe downcast of the underlying model value.
    pub fn focus_as<T: Any + Send + Sync>(&self) -> Outcome<&T> {
        match self.focus().downcast_ref::<T>() {
            Some(value) => Outcome::Success(value),
            None => Outcome::failure(ExecutionError::TypeMismatch {
                expected: std::any::type_name::<T>().to_string(),
                found: format!("focus of type {}", self.tpe()),
            }),
        }
    }

    /// Typed lookup through the lexical chain: this cursor's environment
    /// first, then each ancestor's in turn.
    pub fn env_value<T: 'static>(&self, name: &str) -> Option<&T> {
        if let Some(value) = self.env().get::<T>(name) {
            return Some(value);
        }
        let mut next = self.parent();
        while let Some(parent) = next {
            if let Some(value) = parent.env().get::<T>(name) {
                return Some(value);
            }
            next = parent.parent();
        }
        None
    }

    pub fn require_env<T: 'static>(&self, name: &str) -> Outcome<&T> {
        match self.env_value::<T>(name) {
            Some(value) => Outcome::Success(value),
            None => Outcome::failure(ExecutionError::EnvLookupFailed {
                name: name.to_string(),
            }),
        }
    }
}
