//! Change detector
//!
//! Diffs a new consensus record against the baseline. Pure: the same
//! `(previous, current)` pair always yields the same [`ChangeSet`].

use crate::model::{ChangeSet, FieldValue, GeoRecord, TrackedField};

/// Coordinate tolerance in degrees (roughly 1 km)
pub const COORDINATE_TOLERANCE: f64 = 0.01;

/// Slack for binary representation error when a distance sits on the tolerance
const TOLERANCE_SLACK: f64 = 1e-9;

/// Compute the field-level diff between the baseline and a new record
///
/// With no baseline every present tracked field is reported with `old = None`
/// (first observation). Numeric pairs differing by at most
/// [`COORDINATE_TOLERANCE`] are not reported; any other inequality is,
/// including a value appearing or disappearing.
pub fn detect_changes(previous: Option<&GeoRecord>, current: &GeoRecord) -> ChangeSet {
    let mut changes = ChangeSet::new();

    let Some(previous) = previous else {
        for field in TrackedField::ALL {
            if let Some(value) = current.get(field) {
                changes.insert(field, None, Some(value));
            }
        }
        return changes;
    };

    for field in TrackedField::ALL {
        let old = previous.get(field);
        let new = current.get(field);

        let changed = match (&old, &new) {
            (Some(FieldValue::Number(a)), Some(FieldValue::Number(b))) => {
                distance(*a, *b) > COORDINATE_TOLERANCE + TOLERANCE_SLACK
            }
            _ => old != new,
        };

        if changed {
            changes.insert(field, old, new);
        }
    }

    changes
}

/// Straight-line distance along one axis
fn distance(a: f64, b: f64) -> f64 {
    (b - a).hypot(0.0)
}
