//! Response assembly
//!
//! Each handler receives an empty [`Response`], fills it and hands it back.
//! Record sequences become arrays of objects under a single key, preserving
//! the order in which the parser produced them.

use crate::status::RpcResult;
use serde::Serialize;
use serde_json::{Map, Value};

/// Reply body under construction
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Response {
    fields: Map<String, Value>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an ordered record sequence as `{key: [record, ...]}`
    pub fn with_array<T, I>(mut self, key: &str, records: I) -> RpcResult<Self>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let items = records
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        self.fields.insert(key.to_string(), Value::Array(items));
        Ok(self)
    }

    pub fn with_field<T: Serialize>(mut self, key: &str, value: T) -> RpcResult<Self> {
        self.fields.insert(key.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Add the field only when a value is present
    pub fn with_optional<T: Serialize>(self, key: &str, value: Option<T>) -> RpcResult<Self> {
        match value {
            Some(value) => self.with_field(key, value),
            None => Ok(self),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Entry {
        name: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        extra: Option<u32>,
    }

    #[test]
    fn test_array_preserves_order() {
        let response = Response::new()
            .with_array(
                "entries",
                vec![
                    Entry { name: "b", extra: None },
                    Entry { name: "a", extra: Some(1) },
                ],
            )
            .unwrap();

        assert_eq!(
            response.into_value(),
            json!({"entries": [{"name": "b"}, {"name": "a", "extra": 1}]})
        );
    }

    #[test]
    fn test_empty_array_is_still_emitted() {
        let response = Response::new()
            .with_array("routes", Vec::<Entry>::new())
            .unwrap();
        assert_eq!(response.into_value(), json!({"routes": []}));
    }

    #[test]
    fn test_optional_fields() {
        let response = Response::new()
            .with_optional("count", Some(12u64))
            .unwrap()
            .with_optional::<u64>("limit", None)
            .unwrap();
        assert_eq!(response.into_value(), json!({"count": 12}));
        assert!(Response::new().is_empty());
    }
}
