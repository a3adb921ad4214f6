//! Typed festival map document.
//!
//! Only `name`, `lat` and `lng` are known to the domain; every other field on
//! a location (capacity, description, opening hours, ...) lives in
//! [`Location::extra`] and is carried through merges verbatim.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Version tag stamped on every document produced by a merge.
pub const MERGE_FORMAT_VERSION: &str = "1.0";

/// A single point of interest on the festival map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Fields the domain does not interpret, preserved as submitted.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Location {
    #[must_use]
    pub fn new(name: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
            extra: Map::new(),
        }
    }

    /// Shallow field merge: every field present on `incoming` replaces the
    /// same-named field here, everything else is kept.
    ///
    /// `name`, `lat` and `lng` are always present on a valid record, so they
    /// always take the incoming value.
    #[must_use]
    pub fn overlay(&self, incoming: &Location) -> Location {
        let mut extra = self.extra.clone();
        for (key, value) in &incoming.extra {
            extra.insert(key.clone(), value.clone());
        }

        Location {
            name: incoming.name.clone(),
            lat: incoming.lat,
            lng: incoming.lng,
            extra,
        }
    }
}

/// Document-level bookkeeping. `totalLocations` is derived and recomputed on
/// every merge; other keys are opaque.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(
        rename = "totalLocations",
        default,
        deserialize_with = "lenient_count"
    )]
    pub total_locations: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The canonical festival map document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDocument {
    #[serde(default, deserialize_with = "lenient_version")]
    pub version: String,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_updated: Option<DateTime<Utc>>,
    /// Category name to ordered locations.
    pub locations: BTreeMap<String, Vec<Location>>,
    #[serde(default, deserialize_with = "lenient_metadata")]
    pub metadata: Metadata,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MapDocument {
    /// Sum of all category lengths.
    #[must_use]
    pub fn total_locations(&self) -> usize {
        self.locations.values().map(Vec::len).sum()
    }

    /// Brings `metadata.totalLocations` back in line with the category contents.
    pub fn recount(&mut self) {
        self.metadata.total_locations = self.total_locations();
    }

    /// Locations in `category`, or an empty slice when the category is absent.
    #[must_use]
    pub fn category(&self, category: &str) -> &[Location] {
        self.locations.get(category).map_or(&[], Vec::as_slice)
    }
}

/// Accepts any RFC 3339 string; anything else reads as absent. The field is
/// overwritten on merge, so a malformed value on a submission is not worth
/// rejecting the whole document over.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}

/// `version` and `metadata` are rewritten on merge, so a wrong type reads as
/// the default instead of failing the decode.
fn lenient_version<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::String(s)) => s,
        _ => String::new(),
    })
}

fn lenient_metadata<'de, D>(deserializer: D) -> Result<Metadata, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_default(),
        _ => Metadata::default(),
    })
}

fn lenient_count<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or_default())
}
