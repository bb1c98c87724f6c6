//! Consensus engine
//!
//! Merges the normalized answers of one cycle into a single best-guess record:
//! majority vote for categorical fields, trimmed mean for coordinates.
//!
//! ## Tie-break
//!
//! When several values share the highest vote count, the one seen first in
//! provider order wins. This is an arbitrary but deterministic rule; it says
//! nothing about which provider is more accurate.

use crate::model::GeoRecord;

/// Reconcile provider records into one consensus record
///
/// Returns `None` for empty input; the monitor treats that as a no-data cycle
/// and never asks for a consensus of nothing.
pub fn consensus(records: &[GeoRecord]) -> Option<GeoRecord> {
    if records.is_empty() {
        return None;
    }

    let (latitude, longitude) = coordinates(records);

    Some(GeoRecord {
        query: majority(records.iter().map(|r| Some(r.query.as_str()))).unwrap_or_default(),
        country: majority(records.iter().map(|r| r.country.as_deref())),
        region: majority(records.iter().map(|r| r.region.as_deref())),
        city: majority(records.iter().map(|r| r.city.as_deref())),
        isp: majority(records.iter().map(|r| r.isp.as_deref())),
        as_number: majority(records.iter().map(|r| r.as_number.as_deref())),
        latitude,
        longitude,
    })
}

/// Most frequent present value; ties go to the first-encountered value
pub fn majority<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    // (value, count) in first-seen order
    let mut tally: Vec<(&str, usize)> = Vec::new();

    for value in values.into_iter().flatten().filter(|v| !v.is_empty()) {
        match tally.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => tally.push((value, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (value, count) in tally {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((value, count));
        }
    }

    best.map(|(value, _)| value.to_string())
}

/// Per-axis trimmed mean over providers that reported a full coordinate pair
fn coordinates(records: &[GeoRecord]) -> (Option<f64>, Option<f64>) {
    let (lats, lons): (Vec<f64>, Vec<f64>) = records
        .iter()
        .filter_map(|r| match (r.latitude, r.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        })
        .unzip();

    (trimmed_mean(&lats), trimmed_mean(&lons))
}

/// Mean after discarding `max(1, n / 6)` samples from each end
///
/// With two samples or fewer the plain arithmetic mean is returned.
pub fn trimmed_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let kept = if n <= 2 {
        &sorted[..]
    } else {
        let trim = std::cmp::max(1, n / 6);
        &sorted[trim..n - trim]
    };

    Some(kept.iter().sum::<f64>() / kept.len() as f64)
}
