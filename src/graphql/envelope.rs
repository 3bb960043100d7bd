//! GraphQL response envelope decoding
//!
//! Field matching is case-insensitive: object keys under the root field are
//! folded to lower case before decoding, so target types name their
//! multi-word fields in lower case on the deserialize side.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Error;

/// Result of one query, decoded once from the response envelope
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome<T> {
    /// The root field was present and decoded
    Data(T),

    /// The server reported errors; `data` is ignored even if present
    Errors(Vec<String>),

    /// Neither errors nor the root field
    Absent,
}

impl<T> QueryOutcome<T> {
    /// The decoded payload, if any
    pub fn into_data(self) -> Option<T> {
        match self {
            QueryOutcome::Data(data) => Some(data),
            QueryOutcome::Errors(_) | QueryOutcome::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, QueryOutcome::Absent)
    }
}

/// Raw `{ "data": ..., "errors": [...] }` envelope
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Envelope {
    #[serde(default)]
    data: Option<Value>,

    #[serde(default)]
    errors: Option<Value>,
}

impl Envelope {
    /// Decode `data.<root_field>` into `T` unless the server reported errors
    pub(crate) fn into_outcome<T: DeserializeOwned>(
        self,
        root_field: &str,
    ) -> Result<QueryOutcome<T>, Error> {
        if let Some(Value::Array(errors)) = &self.errors {
            if !errors.is_empty() {
                return Ok(QueryOutcome::Errors(error_messages(errors)));
            }
        }

        let field = match self.data {
            Some(Value::Object(mut data)) => data.remove(root_field),
            _ => None,
        };

        match field {
            None | Some(Value::Null) => Ok(QueryOutcome::Absent),
            Some(value) => Ok(QueryOutcome::Data(serde_json::from_value(fold_keys(value))?)),
        }
    }
}

/// Collect the non-blank `message` of every error entry
fn error_messages(errors: &[Value]) -> Vec<String> {
    errors
        .iter()
        .filter_map(|error| error.get("message").and_then(Value::as_str))
        .filter(|message| !message.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Lower-case every object key, recursively
pub(crate) fn fold_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key.to_lowercase(), fold_keys(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(fold_keys).collect()),
        other => other,
    }
}
