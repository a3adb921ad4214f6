//! Reconciliation of a submitted document against the canonical one.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::geo::is_same_location;
use crate::types::{Location, MapDocument, MERGE_FORMAT_VERSION};

/// How many records a merge appended and how many it updated in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub new_locations: usize,
    pub updated_locations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeResult {
    pub document: MapDocument,
    pub stats: MergeStats,
}

/// Merges `incoming` into `canonical`, stamping the result with the current time.
#[must_use]
pub fn merge(canonical: &MapDocument, incoming: &MapDocument) -> MergeResult {
    merge_at(canonical, incoming, Utc::now())
}

/// Merges `incoming` into `canonical` as of `now`.
///
/// Each category of `incoming` is reconciled on its own; categories only in
/// `canonical` pass through untouched. Within a category every submitted
/// record either updates the first record it matches (see
/// [`is_same_location`]) or is appended. Records appended or updated earlier
/// in the same submission take part in matching for later ones.
///
/// First match wins and ambiguity is not reported: if two canonical records
/// would both match a submission, the earlier one is updated.
///
/// Neither input is modified. The result carries [`MERGE_FORMAT_VERSION`],
/// `now` as `lastUpdated`, and a recomputed `metadata.totalLocations`.
#[must_use]
pub fn merge_at(
    canonical: &MapDocument,
    incoming: &MapDocument,
    now: DateTime<Utc>,
) -> MergeResult {
    let mut stats = MergeStats::default();
    let mut locations = canonical.locations.clone();

    for (category, submitted) in &incoming.locations {
        let merged = merge_category(canonical.category(category), submitted, &mut stats);
        locations.insert(category.clone(), merged);
    }

    let mut document = MapDocument {
        version: MERGE_FORMAT_VERSION.to_string(),
        last_updated: Some(now),
        locations,
        metadata: canonical.metadata.clone(),
        extra: canonical.extra.clone(),
    };
    document.recount();

    MergeResult { document, stats }
}

fn merge_category(
    existing: &[Location],
    submitted: &[Location],
    stats: &mut MergeStats,
) -> Vec<Location> {
    submitted
        .iter()
        .fold(existing.to_vec(), |mut merged, incoming| {
            match merged
                .iter()
                .position(|current| is_same_location(incoming, current))
            {
                Some(index) => {
                    merged[index] = merged[index].overlay(incoming);
                    stats.updated_locations += 1;
                }
                None => {
                    merged.push(incoming.clone());
                    stats.new_locations += 1;
                }
            }
            merged
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn doc(value: serde_json::Value) -> MapDocument {
        serde_json::from_value(value).expect("fixture should decode")
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 31, 18, 0, 0).unwrap()
    }

    #[test]
    fn matching_record_gains_new_fields() {
        let canonical = doc(json!({
            "locations": {"stages": [{"name": "Main Stage", "lat": 52.0, "lng": 15.0}]}
        }));
        let incoming = doc(json!({
            "locations": {"stages": [
                {"name": "main stage", "lat": 52.0, "lng": 15.0, "capacity": 5000}
            ]}
        }));

        let result = merge_at(&canonical, &incoming, fixed_now());

        assert_eq!(
            result.stats,
            MergeStats {
                new_locations: 0,
                updated_locations: 1
            }
        );
        let stages = result.document.category("stages");
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].extra.get("capacity"), Some(&json!(5000)));
    }

    #[test]
    fn update_keeps_fields_absent_from_submission() {
        let canonical = doc(json!({
            "locations": {"food": [
                {"name": "Pierogi", "lat": 52.0, "lng": 15.0, "vegan": true, "hours": "10-22"}
            ]}
        }));
        let incoming = doc(json!({
            "locations": {"food": [{"name": "PIEROGI", "lat": 52.1, "lng": 15.1, "hours": "12-24"}]}
        }));

        let result = merge_at(&canonical, &incoming, fixed_now());
        let rec = &result.document.category("food")[0];

        assert_eq!(rec.extra.get("vegan"), Some(&json!(true)));
        assert_eq!(rec.extra.get("hours"), Some(&json!("12-24")));
        assert!((rec.lat - 52.1).abs() < f64::EPSILON);
        assert_eq!(result.stats.new_locations, 0);
    }

    #[test]
    fn unmatched_record_is_appended_to_new_category() {
        let canonical = doc(json!({
            "locations": {"stages": [{"name": "Main Stage", "lat": 52.0, "lng": 15.0}]}
        }));
        let incoming = doc(json!({
            "locations": {"toilets": [{"name": "WC North", "lat": 52.01, "lng": 15.0}]}
        }));

        let result = merge_at(&canonical, &incoming, fixed_now());

        assert_eq!(result.stats.new_locations, 1);
        assert_eq!(result.stats.updated_locations, 0);
        assert_eq!(result.document.category("toilets").len(), 1);
        assert_eq!(result.document.category("stages").len(), 1);
        assert_eq!(result.document.metadata.total_locations, 2);
    }

    #[test]
    fn matching_is_scoped_to_the_category() {
        let canonical = doc(json!({
            "locations": {"stages": [{"name": "Info", "lat": 52.0, "lng": 15.0}]}
        }));
        let incoming = doc(json!({
            "locations": {"info": [{"name": "Info", "lat": 52.0, "lng": 15.0}]}
        }));

        let result = merge_at(&canonical, &incoming, fixed_now());
        assert_eq!(result.stats.new_locations, 1);
        assert_eq!(result.document.metadata.total_locations, 2);
    }

    #[test]
    fn first_match_wins() {
        let canonical = doc(json!({
            "locations": {"bars": [
                {"name": "Bar A", "lat": 52.0, "lng": 15.0},
                {"name": "Bar B", "lat": 52.0, "lng": 15.000_01}
            ]}
        }));
        let incoming = doc(json!({
            "locations": {"bars": [{"name": "Bar C", "lat": 52.0, "lng": 15.000_005, "open": true}]}
        }));

        let result = merge_at(&canonical, &incoming, fixed_now());
        let bars = result.document.category("bars");

        assert_eq!(result.stats.updated_locations, 1);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].name, "Bar C");
        assert_eq!(bars[0].extra.get("open"), Some(&json!(true)));
        assert_eq!(bars[1].name, "Bar B");
        assert!(bars[1].extra.is_empty());
    }

    #[test]
    fn later_submissions_match_records_appended_earlier() {
        let canonical = doc(json!({"locations": {}}));
        let incoming = doc(json!({
            "locations": {"medic": [
                {"name": "Medic 1", "lat": 52.0, "lng": 15.0},
                {"name": "medic 1", "lat": 52.0, "lng": 15.0, "phone": "112"}
            ]}
        }));

        let result = merge_at(&canonical, &incoming, fixed_now());
        assert_eq!(
            result.stats,
            MergeStats {
                new_locations: 1,
                updated_locations: 1
            }
        );
        assert_eq!(result.document.category("medic").len(), 1);
    }

    #[test]
    fn untouched_categories_and_metadata_pass_through() {
        let canonical = doc(json!({
            "version": "0.9",
            "locations": {
                "stages": [{"name": "Main Stage", "lat": 52.0, "lng": 15.0}],
                "food": [{"name": "Pierogi", "lat": 52.1, "lng": 15.1}]
            },
            "metadata": {"totalLocations": 17, "festival": "summer"},
            "mapCenter": [52.0, 15.0]
        }));
        let incoming = doc(json!({"locations": {"stages": []}}));

        let result = merge_at(&canonical, &incoming, fixed_now());
        let merged = &result.document;

        assert_eq!(merged.version, MERGE_FORMAT_VERSION);
        assert_eq!(merged.last_updated, Some(fixed_now()));
        assert_eq!(merged.category("food"), canonical.category("food"));
        assert_eq!(merged.metadata.total_locations, 2);
        assert_eq!(merged.metadata.extra.get("festival"), Some(&json!("summer")));
        assert_eq!(merged.extra.get("mapCenter"), Some(&json!([52.0, 15.0])));
        assert_eq!(result.stats, MergeStats::default());
    }

    #[test]
    fn inputs_are_left_unchanged() {
        let canonical = doc(json!({
            "locations": {"stages": [{"name": "Main Stage", "lat": 52.0, "lng": 15.0}]}
        }));
        let incoming = doc(json!({
            "locations": {"stages": [
                {"name": "Main Stage", "lat": 52.0, "lng": 15.0, "capacity": 1},
                {"name": "Tent", "lat": 53.0, "lng": 15.0}
            ]}
        }));
        let canonical_before = canonical.clone();
        let incoming_before = incoming.clone();

        let _ = merge(&canonical, &incoming);

        assert_eq!(canonical, canonical_before);
        assert_eq!(incoming, incoming_before);
    }

    #[test]
    fn total_matches_category_lengths() {
        let canonical = doc(json!({
            "locations": {
                "a": [{"name": "A1", "lat": 1.0, "lng": 1.0}],
                "b": [{"name": "B1", "lat": 2.0, "lng": 2.0}, {"name": "B2", "lat": 3.0, "lng": 3.0}]
            },
            "metadata": {"totalLocations": 0}
        }));
        let incoming = doc(json!({
            "locations": {
                "b": [{"name": "B3", "lat": 4.0, "lng": 4.0}, {"name": "b1", "lat": 2.0, "lng": 2.0}],
                "c": [{"name": "C1", "lat": 5.0, "lng": 5.0}]
            }
        }));

        let result = merge_at(&canonical, &incoming, fixed_now());
        let expected: usize = result.document.locations.values().map(Vec::len).sum();

        assert_eq!(result.document.metadata.total_locations, expected);
        assert_eq!(expected, 5);
        assert_eq!(
            result.stats,
            MergeStats {
                new_locations: 2,
                updated_locations: 1
            }
        );
    }
}
