//! Parsing raw bytes into a validated [`MapDocument`].

use serde_json::Value;
use thiserror::Error;

use crate::types::MapDocument;
use crate::validate::{validate_map_structure, ValidationError};

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("map data is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("invalid map data: {0}")]
    Invalid(#[from] ValidationError),

    /// Passed structural validation but a known field has the wrong type,
    /// e.g. a numeric `name`.
    #[error("map data does not fit the document model: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Parses, validates and decodes a serialized map document.
///
/// # Errors
///
/// [`DocumentError::Malformed`] when `bytes` is not JSON, otherwise see
/// [`decode_map_document`].
pub fn parse_map_document(bytes: &[u8]) -> Result<MapDocument, DocumentError> {
    let value: Value = serde_json::from_slice(bytes).map_err(DocumentError::Malformed)?;
    decode_map_document(value)
}

/// Validates an already-parsed JSON value and decodes it.
///
/// # Errors
///
/// [`DocumentError::Invalid`] with the first structural failure, or
/// [`DocumentError::Decode`] if a field has a type the model cannot hold.
pub fn decode_map_document(value: Value) -> Result<MapDocument, DocumentError> {
    validate_map_structure(&value)?;
    serde_json::from_value(value).map_err(DocumentError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_valid_document() {
        let doc = parse_map_document(
            br#"{"locations":{"stages":[{"name":"Main Stage","lat":52.0,"lng":15.0}]}}"#,
        )
        .expect("valid");
        assert_eq!(doc.category("stages").len(), 1);
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_map_document(b"<html>").unwrap_err();
        assert!(matches!(err, DocumentError::Malformed(_)));
    }

    #[test]
    fn structural_failure_comes_before_decoding() {
        let err = parse_map_document(br#"{"locations":[]}"#).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Invalid(ValidationError::LocationsNotMapping)
        ));
    }

    #[test]
    fn wrong_name_type_is_a_decode_error() {
        let err =
            parse_map_document(br#"{"locations":{"s":[{"name":7,"lat":1,"lng":1}]}}"#).unwrap_err();
        assert!(matches!(err, DocumentError::Decode(_)));
    }

    #[test]
    fn numeric_version_reads_as_default() {
        let doc = parse_map_document(
            br#"{"version":2,"locations":{"s":[{"name":"A","lat":1,"lng":1}]}}"#,
        )
        .expect("version type is not checked");
        assert_eq!(doc.version, "");
        assert_eq!(doc.category("s").len(), 1);
    }

    #[test]
    fn null_version_reads_as_default() {
        let doc = parse_map_document(
            br#"{"version":null,"locations":{"s":[{"name":"A","lat":1,"lng":1}]}}"#,
        )
        .expect("null version is accepted");
        assert_eq!(doc.version, "");
    }

    #[test]
    fn null_or_scalar_metadata_reads_as_default() {
        for raw in [
            br#"{"metadata":null,"locations":{"s":[{"name":"A","lat":1,"lng":1}]}}"#.as_slice(),
            br#"{"metadata":"n/a","locations":{"s":[{"name":"A","lat":1,"lng":1}]}}"#.as_slice(),
        ] {
            let doc = parse_map_document(raw).expect("metadata type is not checked");
            assert_eq!(doc.metadata, crate::types::Metadata::default());
        }
    }

    #[test]
    fn metadata_object_keeps_opaque_keys() {
        let doc = parse_map_document(
            br#"{"metadata":{"totalLocations":1,"source":"ops"},"locations":{}}"#,
        )
        .expect("valid");
        assert_eq!(doc.metadata.total_locations, 1);
        assert_eq!(doc.metadata.extra.get("source"), Some(&serde_json::json!("ops")));
    }
}
