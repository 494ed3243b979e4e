//! Typed-object (de)serialization

use crate::CacheError;
use serde::{de::DeserializeOwned, Serialize};

/// Trait for pluggable typed-object serialization formats.
///
/// Values are wrapped in a single-field record (`{"Value": T}`) so that
/// primitive and nullable values round-trip unambiguously at the root; see
/// §4.2.
pub trait Serializer: Send + Sync + Clone + 'static {
    /// Name of the serializer (for diagnostics)
    fn name(&self) -> &str;

    /// Serialize a value to a wrapped byte payload
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError>;

    /// Deserialize a wrapped byte payload, falling back to an unwrapped
    /// decode for entries written by legacy versions.
    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError>;
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Wrapper<T> {
    #[serde(rename = "Value")]
    value: T,
}

/// JSON serializer (default and only built-in format; see DESIGN.md for why
/// a binary-JSON/BSON format was not adopted).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &str {
        "json"
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CacheError> {
        let wrapped = Wrapper { value };
        serde_json::to_vec(&wrapped).map_err(|e| CacheError::SerializationFailed(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CacheError> {
        match serde_json::from_slice::<Wrapper<T>>(bytes) {
            Ok(wrapped) => Ok(wrapped.value),
            Err(_) => {
                tracing::warn!("falling back to unwrapped decode of legacy cache payload");
                serde_json::from_slice(bytes)
                    .map_err(|e| CacheError::SerializationFailed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip() {
        let serializer = JsonSerializer;
        let value = vec![1, 2, 3, 4, 5];

        let bytes = serializer.serialize(&value).unwrap();
        let decoded: Vec<i32> = serializer.deserialize(&bytes).unwrap();

        assert_eq!(value, decoded);
    }

    #[test]
    fn test_json_struct() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct TestStruct {
            name: String,
            value: i32,
        }

        let serializer = JsonSerializer;
        let value = TestStruct {
            name: "test".to_string(),
            value: 42,
        };

        let bytes = serializer.serialize(&value).unwrap();
        let decoded: TestStruct = serializer.deserialize(&bytes).unwrap();

        assert_eq!(value, decoded);
    }

    #[test]
    fn test_wrapped_payload_is_a_value_record() {
        let serializer = JsonSerializer;
        let bytes = serializer.serialize(&42i32).unwrap();
        let as_json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(as_json["Value"], 42);
    }

    #[test]
    fn test_legacy_unwrapped_payload_falls_back() {
        let serializer = JsonSerializer;
        // A legacy entry written as a bare, unwrapped value.
        let bytes = serde_json::to_vec(&42i32).unwrap();
        let decoded: i32 = serializer.deserialize(&bytes).unwrap();
        assert_eq!(decoded, 42);
    }

    #[test]
    fn test_json_serializer_name() {
        assert_eq!(JsonSerializer.name(), "json");
    }
}
