use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Untyped key-value payload as held by the document store.
pub type Fields = serde_json::Map<String, Value>;

/// A stored record could not be turned into its typed form.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed {entity} record '{id}': {source}")]
    Malformed {
        entity: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{entity} record '{id}' has out-of-range timestamp {value}")]
    Timestamp {
        entity: &'static str,
        id: String,
        value: i64,
    },
}

/// Decode a record schema from raw fields. Missing required fields and
/// wrong types are errors; defaults are whatever the schema declares.
pub fn decode_record<T: DeserializeOwned>(
    entity: &'static str,
    id: &str,
    fields: &Fields,
) -> Result<T, DecodeError> {
    serde_json::from_value(Value::Object(fields.clone())).map_err(|source| DecodeError::Malformed {
        entity,
        id: id.to_string(),
        source,
    })
}

/// Encode a record schema into raw fields.
///
/// Record schemas are flat structs of strings and integers, so they always
/// serialize to an object.
pub fn encode_record<T: Serialize>(record: &T) -> Fields {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => Fields::new(),
    }
}

/// A payload holding a single named value.
pub fn single_field(name: &str, value: impl Into<Value>) -> Fields {
    let mut fields = Fields::new();
    fields.insert(name.to_string(), value.into());
    fields
}
