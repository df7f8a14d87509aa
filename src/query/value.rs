use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};

/// Constant values carried by select bindings: scalars, enums, lists and
/// input objects. Variables have been substituted before these are built.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    List(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Int(n) => serde_json::Value::Number((*n).into()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Enum(s) => serde_json::Value::String(s.to_string()),
            Value::Float(n) => match serde_json::Number::from_f64(*n) {
                Some(num) => serde_json::Value::Number(num),
                None => serde_json::Value::Null,
            },
            Value::List(l) => serde_json::Value::Array(l.iter().map(|v| v.into()).collect()),
            Value::Object(o) => serde_json::Value::Object(
                o.iter().map(|(k, v)| (k.to_string(), v.into())).collect(),
            ),
            Value::String(s) => serde_json::Value::String(s.to_string()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Enum(e) => write!(f, "{}", e),
            Value::List(l) => {
                let values: Vec<String> = l.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", values.join(", "))
            }
            Value::Object(o) => {
                let entries: Vec<String> =
                    o.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", entries.join(", "))
            }
        }
    }
}

/// A named argument attached to a select.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Binding {
    pub name: String,
    pub value: Value,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: Value) -> Binding {
        Binding {
            name: name.into(),
            value,
        }
    }
}

impl Display for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

pub fn binding<'a>(args: &'a [Binding], name: &str) -> Option<&'a Value> {
    args.iter().find(|b| b.name == name).map(|b| &b.value)
}
