use serde_json::Value as Json;

use crate::cursor::CursorRef;
use crate::query::Query;
use crate::schema::Type;

/// A partially-materialized response tree: plain JSON, or structure still
/// containing deferred holes to be filled by another interpreter.
#[derive(Debug, Clone)]
pub enum ProtoJson {
    Pure(Json),
    /// A hole: field `field_name` of `tpe` at `cursor`, to be resolved by
    /// whichever component claims it during completion.
    Deferred {
        cursor: CursorRef,
        tpe: Type,
        field_name: String,
        query: Query,
    },
    Object(Vec<(String, ProtoJson)>),
    Array(Vec<ProtoJson>),
}

impl ProtoJson {
    pub fn null() -> ProtoJson {
        ProtoJson::Pure(Json::Null)
    }

    pub fn is_pure(&self) -> bool {
        matches!(self, ProtoJson::Pure(_))
    }

    /// An object from named fields, collapsing to `Pure` when every field
    /// already is.
    pub fn from_fields(fields: Vec<(String, ProtoJson)>) -> ProtoJson {
        if fields.iter().all(|(_, value)| value.is_pure()) {
            let object: serde_json::Map<String, Json> = fields
                .into_iter()
                .map(|(name, value)| match value {
                    ProtoJson::Pure(json) => (name, json),
                    _ => unreachable!("all fields checked pure"),
                })
                .collect();
            ProtoJson::Pure(Json::Object(object))
        } else {
            ProtoJson::Object(fields)
        }
    }

    /// An array from values, collapsing to `Pure` when every element
    /// already is.
    pub fn from_values(values: Vec<ProtoJson>) -> ProtoJson {
        if values.iter().all(ProtoJson::is_pure) {
            let array: Vec<Json> = values
                .into_iter()
                .map(|value| match value {
                    ProtoJson::Pure(json) => json,
                    _ => unreachable!("all values checked pure"),
                })
                .collect();
            ProtoJson::Pure(Json::Array(array))
        } else {
            ProtoJson::Array(values)
        }
    }
}

impl From<Json> for ProtoJson {
    fn from(json: Json) -> Self {
        ProtoJson::Pure(json)
    }
}
