//! Structural validation of submitted map documents.
//!
//! Validation runs on untyped JSON so that a missing or mistyped field can be
//! reported with its exact path before any typed decoding happens. Checks
//! short-circuit: the first failure anywhere in the document is returned.

use serde_json::{Map, Value};
use thiserror::Error;

const REQUIRED_FIELDS: [&str; 3] = ["name", "lat", "lng"];

/// The first rule a document or location broke.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("map data must be a JSON object")]
    NotAnObject,

    #[error("map data is missing the 'locations' field")]
    MissingLocations,

    #[error("'locations' must be an object mapping category names to location arrays")]
    LocationsNotMapping,

    #[error("category '{category}' must be an array of locations")]
    CategoryNotSequence { category: String },

    #[error("location at {path} must be an object")]
    LocationNotObject { path: String },

    #[error("missing required field '{field}' in location at {path}")]
    MissingField { path: String, field: &'static str },

    #[error("field '{field}' must be a number in location at {path}")]
    NonNumericCoordinate { path: String, field: &'static str },

    #[error("field 'lat' must be between -90 and 90 in location at {path} (got {value})")]
    LatitudeOutOfRange { path: String, value: f64 },

    #[error("field 'lng' must be between -180 and 180 in location at {path} (got {value})")]
    LongitudeOutOfRange { path: String, value: f64 },
}

impl ValidationError {
    /// Where in the document the failure was found.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::NotAnObject => "$",
            Self::MissingLocations | Self::LocationsNotMapping => "locations",
            Self::CategoryNotSequence { category } => category.as_str(),
            Self::LocationNotObject { path }
            | Self::MissingField { path, .. }
            | Self::NonNumericCoordinate { path, .. }
            | Self::LatitudeOutOfRange { path, .. }
            | Self::LongitudeOutOfRange { path, .. } => path.as_str(),
        }
    }
}

/// Checks one location record. `path` is only used in error messages.
///
/// A field whose value is `null` counts as missing.
///
/// # Errors
///
/// Returns the first [`ValidationError`] in rule order: presence of `name`,
/// `lat`, `lng`; numeric coordinates; coordinate ranges.
pub fn validate_location(location: &Value, path: &str) -> Result<(), ValidationError> {
    let Some(fields) = location.as_object() else {
        return Err(ValidationError::LocationNotObject {
            path: path.to_string(),
        });
    };

    if let Some(field) = REQUIRED_FIELDS
        .into_iter()
        .find(|f| fields.get(*f).is_none_or(Value::is_null))
    {
        return Err(ValidationError::MissingField {
            path: path.to_string(),
            field,
        });
    }

    let lat = coordinate(fields, "lat", path)?;
    let lng = coordinate(fields, "lng", path)?;

    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::LatitudeOutOfRange {
            path: path.to_string(),
            value: lat,
        });
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(ValidationError::LongitudeOutOfRange {
            path: path.to_string(),
            value: lng,
        });
    }

    Ok(())
}

fn coordinate(
    fields: &Map<String, Value>,
    field: &'static str,
    path: &str,
) -> Result<f64, ValidationError> {
    fields
        .get(field)
        .and_then(Value::as_f64)
        .ok_or_else(|| ValidationError::NonNumericCoordinate {
            path: path.to_string(),
            field,
        })
}

/// Checks the shape of a whole document and every location in it.
///
/// Locations are reported as `<category>[<index>]`.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found, unchanged from the
/// per-location check when a location is at fault.
pub fn validate_map_structure(document: &Value) -> Result<(), ValidationError> {
    let Some(root) = document.as_object() else {
        return Err(ValidationError::NotAnObject);
    };

    let categories = match root.get("locations") {
        None => return Err(ValidationError::MissingLocations),
        Some(Value::Object(categories)) => categories,
        Some(_) => return Err(ValidationError::LocationsNotMapping),
    };

    for (category, entries) in categories {
        let Some(entries) = entries.as_array() else {
            return Err(ValidationError::CategoryNotSequence {
                category: category.clone(),
            });
        };
        for (index, location) in entries.iter().enumerate() {
            validate_location(location, &format!("{category}[{index}]"))?;
        }
    }

    Ok(())
}
