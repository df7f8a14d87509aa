use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::instrument;

use crate::result::{Outcome, Problem};

/// The GraphQL response envelope: `data` when a proto completed to a
/// non-empty value, `errors` when problems were collected, possibly both.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct QueryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub errors: Vec<Problem>,
}

impl QueryResponse {
    pub fn from_outcome(outcome: Outcome<Json>) -> QueryResponse {
        let (problems, data) = outcome.into_parts();
        QueryResponse {
            data: data.filter(|value| !is_empty_value(value)),
            errors: problems,
        }
    }
}

fn is_empty_value(value: &Json) -> bool {
    match value {
        Json::Null => true,
        Json::Object(object) => object.is_empty(),
        _ => false,
    }
}

/// Deeply merge `source` into `target`: objects merge by key, arrays merge
/// pointwise, anything else is overridden.
#[instrument(level = "trace", name = "deep_merge", skip_all)]
pub fn deep_merge(target: &mut Json, source: Json) {
    match (target, source) {
        (Json::Object(target_map), Json::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => deep_merge(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (Json::Array(target_arr), Json::Array(source_arr)) => {
            for (target_value, source_value) in target_arr.iter_mut().zip(source_arr) {
                deep_merge(target_value, source_value);
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Insert a field into a response object, merging with any value already
/// present under the same key.
pub(crate) fn insert_merged(object: &mut serde_json::Map<String, Json>, key: String, value: Json) {
    match object.get_mut(&key) {
        Some(existing) => deep_merge(existing, value),
        None => {
            object.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_omits_absent_members() {
        let response = QueryResponse::from_outcome(Outcome::Success(json!({"foo": {"value": 23}})));
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"data":{"foo":{"value":23}}}"#
        );

        let failed: Outcome<Json> =
            Outcome::Failure(vec![Problem::new("boom").with_path(vec!["foo".to_string()])]);
        let response = QueryResponse::from_outcome(failed);
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"errors":[{"message":"boom","path":["foo"]}]}"#
        );
    }

    #[test]
    fn partial_success_keeps_both_members() {
        let outcome = Outcome::Warnings(vec![Problem::new("slow")], json!({"foo": 1}));
        let response = QueryResponse::from_outcome(outcome);
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"data":{"foo":1},"errors":[{"message":"slow"}]}"#
        );
    }

    #[test]
    fn sibling_objects_merge_deeply() {
        let mut target = json!({"movie": {"title": "Vertigo"}});
        deep_merge(&mut target, json!({"movie": {"year": 1958}}));
        assert_eq!(target, json!({"movie": {"title": "Vertigo", "year": 1958}}));
    }
}
