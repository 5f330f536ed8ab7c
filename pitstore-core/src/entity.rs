//! Point-in-time (PIT) entities as carried by change messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inclusive date range written as a two-element JSON array.
///
/// Either bound may be `null`, which renders as an open side of the range.
///
/// # Examples
/// ```
/// use pitstore_core::DateRange;
///
/// let range: DateRange = serde_json::from_str(r#"["1900-01-01", "1900-12-31"]"#)?;
/// assert_eq!(range.to_string(), "[1900-01-01, 1900-12-31]");
///
/// let open: DateRange = serde_json::from_str(r#"[null, "1950"]"#)?;
/// assert_eq!(open.to_string(), "[, 1950]");
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(Option<String>, Option<String>)",
    into = "(Option<String>, Option<String>)"
)]
pub struct DateRange {
    /// Lower bound, inclusive.
    pub lower: Option<String>,
    /// Upper bound, inclusive.
    pub upper: Option<String>,
}

impl DateRange {
    /// Build a range from two bounds.
    pub fn new(lower: impl Into<String>, upper: impl Into<String>) -> Self {
        Self {
            lower: Some(lower.into()),
            upper: Some(upper.into()),
        }
    }
}

impl From<(Option<String>, Option<String>)> for DateRange {
    fn from((lower, upper): (Option<String>, Option<String>)) -> Self {
        Self { lower, upper }
    }
}

impl From<DateRange> for (Option<String>, Option<String>) {
    fn from(range: DateRange) -> Self {
        (range.lower, range.upper)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}]",
            self.lower.as_deref().unwrap_or_default(),
            self.upper.as_deref().unwrap_or_default()
        )
    }
}

/// A geospatial record valid over an optional period.
///
/// Field names follow the wire format: `type`, `validSince` and
/// `validUntil`. `data` is free-form JSON and `geometry` a GeoJSON geometry
/// object in WGS 84.
///
/// # Examples
/// ```
/// use pitstore_core::PitEntity;
///
/// let entity: PitEntity = serde_json::from_str(
///     r#"{"id": "a1", "type": "x", "name": "O'Brien", "data": {}}"#,
/// )?;
/// assert_eq!(entity.kind, "x");
/// assert_eq!(entity.name.as_deref(), Some("O'Brien"));
/// assert!(entity.geometry.is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitEntity {
    /// Identifier, unique within a dataset.
    pub id: String,
    /// Entity subtype discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Period in which the entity came into existence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_since: Option<DateRange>,
    /// Period in which the entity ceased to exist.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateRange>,
    /// Arbitrary structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// GeoJSON geometry object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
}

impl PitEntity {
    /// Create an entity with only the required fields set.
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: None,
            valid_since: None,
            valid_until: None,
            data: None,
            geometry: None,
        }
    }

    /// Set the entity name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the structured payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Set the validity ranges.
    #[must_use]
    pub fn with_validity(mut self, since: Option<DateRange>, until: Option<DateRange>) -> Self {
        self.valid_since = since;
        self.valid_until = until;
        self
    }

    /// Set the GeoJSON geometry.
    #[must_use]
    pub fn with_geometry(mut self, geometry: Value) -> Self {
        self.geometry = Some(geometry);
        self
    }
}
