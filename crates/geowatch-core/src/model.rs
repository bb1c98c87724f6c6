//! Canonical geolocation data model
//!
//! Every provider payload is reduced to a [`GeoRecord`]. The consensus of one
//! cycle is a `GeoRecord` as well, and change detection works on the
//! [`TrackedField`] subset of it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical snapshot of location attributes
///
/// Used both for a single provider's answer and for the consensus of a
/// cycle. In a consensus record `latitude` is present iff `longitude` is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoRecord {
    /// The IP as echoed back by the provider (empty when unknown)
    #[serde(default)]
    pub query: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub isp: Option<String>,
    #[serde(rename = "asNumber", alias = "as")]
    pub as_number: Option<String>,
    /// Degrees
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    /// Degrees
    #[serde(alias = "lon")]
    pub longitude: Option<f64>,
}

impl GeoRecord {
    /// Value of a tracked field, if present
    pub fn get(&self, field: TrackedField) -> Option<FieldValue> {
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        match field {
            TrackedField::Country => text(&self.country),
            TrackedField::Region => text(&self.region),
            TrackedField::City => text(&self.city),
            TrackedField::Latitude => self.latitude.map(FieldValue::Number),
            TrackedField::Longitude => self.longitude.map(FieldValue::Number),
            TrackedField::Isp => text(&self.isp),
            TrackedField::AsNumber => text(&self.as_number),
        }
    }
}

/// A normalized record tagged with the provider that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    /// Empty for rows written before results were tagged
    #[serde(default)]
    pub provider: String,
    #[serde(flatten)]
    pub record: GeoRecord,
}

impl ProviderResult {
    pub fn new(provider: impl Into<String>, record: GeoRecord) -> Self {
        Self {
            provider: provider.into(),
            record,
        }
    }
}

/// Fields compared between cycles
///
/// Declaration order is the order changes are listed in alerts. The short
/// names `lat`, `lon` and `as` are accepted when reading stored payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TrackedField {
    Country,
    Region,
    City,
    #[serde(alias = "lat")]
    Latitude,
    #[serde(alias = "lon")]
    Longitude,
    Isp,
    #[serde(alias = "as")]
    AsNumber,
}

impl TrackedField {
    pub const ALL: [TrackedField; 7] = [
        TrackedField::Country,
        TrackedField::Region,
        TrackedField::City,
        TrackedField::Latitude,
        TrackedField::Longitude,
        TrackedField::Isp,
        TrackedField::AsNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrackedField::Country => "country",
            TrackedField::Region => "region",
            TrackedField::City => "city",
            TrackedField::Latitude => "latitude",
            TrackedField::Longitude => "longitude",
            TrackedField::Isp => "isp",
            TrackedField::AsNumber => "asNumber",
        }
    }
}

impl fmt::Display for TrackedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field value, text or coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Old and new value of one changed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub old: Option<FieldValue>,
    pub new: Option<FieldValue>,
}

/// Field-by-field diff between a baseline and a new consensus record
///
/// An empty set means "no change".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(BTreeMap<TrackedField, FieldChange>);

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: TrackedField, old: Option<FieldValue>, new: Option<FieldValue>) {
        self.0.insert(field, FieldChange { old, new });
    }

    pub fn get(&self, field: TrackedField) -> Option<&FieldChange> {
        self.0.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> Vec<TrackedField> {
        self.0.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TrackedField, &FieldChange)> {
        self.0.iter()
    }
}
