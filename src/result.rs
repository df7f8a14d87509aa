use serde::{Deserialize, Serialize};

/// A position in the original query source.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub col: usize,
}

/// A user-visible error entry, rendered into the `errors` member of the
/// response envelope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<Location>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
}

impl Problem {
    pub fn new(message: impl Into<String>) -> Self {
        Problem {
            message: message.into(),
            locations: None,
            path: None,
        }
    }

    pub fn with_path(mut self, path: Vec<String>) -> Self {
        if !path.is_empty() {
            self.path = Some(path);
        }
        self
    }
}

impl From<ExecutionError> for Problem {
    fn from(error: ExecutionError) -> Self {
        Problem::new(error.to_string())
    }
}

/// Failures raised by cursor operations and the interpreter. Each converts
/// into a [`Problem`], with the response path attached at the call site.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("Malformed query: {reason}")]
    MalformedQuery { reason: String },

    #[error("No field '{field_name}' for type {type_name}")]
    FieldNotFound {
        field_name: String,
        type_name: String,
    },

    #[error("Expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Reference to undefined type: {type_name}")]
    UndefinedType { type_name: String },

    #[error("Unsupported type {type_name}")]
    UnsupportedType { type_name: String },

    #[error("Type {type_name} cannot be narrowed to {subtype_name}")]
    NarrowingFailed {
        type_name: String,
        subtype_name: String,
    },

    #[error("Non-nullable value for '{field_name}' is absent")]
    NullabilityViolation { field_name: String },

    #[error("Expected exactly one element, found {count}")]
    TooManyResults { count: usize },

    #[error("Expected exactly one element, found none")]
    EmptyResult,

    #[error("Negative {op} bound: {value}")]
    NegativeBound { op: &'static str, value: i64 },

    #[error("No component claims field '{field_name}' of type {type_name}")]
    UnresolvedDeferral {
        field_name: String,
        type_name: String,
    },

    #[error("Environment value '{name}' not found")]
    EnvLookupFailed { name: String },
}

/// Three-valued result: a value, a value accompanied by non-fatal problems,
/// or problems alone. Problems accumulate additively across binds; a
/// `Failure` short-circuits only the computation it occurred in.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Warnings(Vec<Problem>, T),
    Failure(Vec<Problem>),
}

impl<T> Outcome<T> {
    pub fn failure(problem: impl Into<Problem>) -> Self {
        Outcome::Failure(vec![problem.into()])
    }

    /// Problems plus a value: degenerates to `Success` when there are none.
    pub fn warnings(problems: Vec<Problem>, value: T) -> Self {
        if problems.is_empty() {
            Outcome::Success(value)
        } else {
            Outcome::Warnings(problems, value)
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    pub fn problems(&self) -> &[Problem] {
        match self {
            Outcome::Success(_) => &[],
            Outcome::Warnings(problems, _) => problems,
            Outcome::Failure(problems) => problems,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) | Outcome::Warnings(_, value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    pub fn into_parts(self) -> (Vec<Problem>, Option<T>) {
        match self {
            Outcome::Success(value) => (vec![], Some(value)),
            Outcome::Warnings(problems, value) => (problems, Some(value)),
            Outcome::Failure(problems) => (problems, None),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Warnings(problems, value) => Outcome::Warnings(problems, f(value)),
            Outcome::Failure(problems) => Outcome::Failure(problems),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Outcome::Success(value) => f(value),
            Outcome::Warnings(mut problems, value) => match f(value) {
                Outcome::Success(next) => Outcome::Warnings(problems, next),
                Outcome::Warnings(more, next) => {
                    problems.extend(more);
                    Outcome::Warnings(problems, next)
                }
                Outcome::Failure(more) => {
                    problems.extend(more);
                    Outcome::Failure(problems)
                }
            },
            Outcome::Failure(problems) => Outcome::Failure(problems),
        }
    }

    /// Prepend `path` to every problem that does not already carry one.
    pub fn at_path(self, path: &[String]) -> Outcome<T> {
        if path.is_empty() {
            return self;
        }
        let locate = |problems: Vec<Problem>| {
            problems
                .into_iter()
                .map(|p| {
                    if p.path.is_none() {
                        p.with_path(path.to_vec())
                    } else {
                        p
                    }
                })
                .collect()
        };
        match self {
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Warnings(problems, value) => Outcome::Warnings(locate(problems), value),
            Outcome::Failure(problems) => Outcome::Failure(locate(problems)),
        }
    }

    /// Sequence a collection, accumulating problems from every element. Any
    /// failed element fails the whole, but later problems are still gathered.
    pub fn all(outcomes: impl IntoIterator<Item = Outcome<T>>) -> Outcome<Vec<T>> {
        let mut problems = vec![];
        let mut values = vec![];
        let mut failed = false;
        for outcome in outcomes {
            match outcome {
                Outcome::Success(value) => values.push(value),
                Outcome::Warnings(more, value) => {
                    problems.extend(more);
                    values.push(value);
                }
                Outcome::Failure(more) => {
                    problems.extend(more);
                    failed = true;
                }
            }
        }
        if failed {
            Outcome::Failure(problems)
        } else {
            Outcome::warnings(problems, values)
        }
    }

    /// Combine sibling results: a failed sibling contributes its problems as
    /// warnings while the remaining siblings still contribute their values.
    pub fn gather(outcomes: impl IntoIterator<Item = Outcome<T>>) -> Outcome<Vec<T>> {
        let mut problems = vec![];
        let mut values = vec![];
        for outcome in outcomes {
            let (more, value) = outcome.into_parts();
            problems.extend(more);
            values.extend(value);
        }
        Outcome::warnings(problems, values)
    }
}

impl<T> From<ExecutionError> for Outcome<T> {
    fn from(error: ExecutionError) -> Self {
        Outcome::failure(error)
    }
}
