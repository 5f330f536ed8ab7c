//! Mapping of PIT entities onto table columns.
//!
//! A [`Row`] keeps the raw text of each column. The query compiler renders it
//! either as escaped literals ([`Row::literal`]) or as placeholders paired
//! with bound parameters ([`placeholder`], [`Row::parameter`]). Both paths
//! iterate [`Column::ALL`], so column lists and value lists always line up.

use crate::literal::{NULL_LITERAL, escape_literal, quote_literal};
use crate::{DateRange, PitEntity};

/// Spatial reference assigned to every stored geometry (WGS 84).
pub const SRID: u32 = 4326;

/// Columns of the PIT table, in statement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    /// Entity identifier (key).
    Id,
    /// Partition key (key).
    Dataset,
    /// Human-readable name.
    Name,
    /// Entity subtype.
    Type,
    /// Structured payload as JSON.
    Data,
    /// Validity start range.
    ValidSince,
    /// Validity end range.
    ValidUntil,
    /// PostGIS geometry.
    Geometry,
}

impl Column {
    /// Every column in statement order.
    pub const ALL: [Self; 8] = [
        Self::Id,
        Self::Dataset,
        Self::Name,
        Self::Type,
        Self::Data,
        Self::ValidSince,
        Self::ValidUntil,
        Self::Geometry,
    ];

    /// Columns overwritten when an upsert hits an existing key.
    pub const MUTABLE: [Self; 6] = [
        Self::Name,
        Self::Type,
        Self::Data,
        Self::ValidSince,
        Self::ValidUntil,
        Self::Geometry,
    ];

    /// Column identifier as used in statements.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Dataset => "dataset",
            Self::Name => "name",
            Self::Type => "type",
            Self::Data => "data",
            Self::ValidSince => "validSince",
            Self::ValidUntil => "validUntil",
            Self::Geometry => "geometry",
        }
    }
}

/// Render the placeholder expression for `column` bound at `$index`.
///
/// Every parameter travels as text; casts turn it into the column type on
/// the server.
///
/// # Examples
/// ```
/// use pitstore_core::row::{Column, placeholder};
///
/// assert_eq!(placeholder(Column::Id, 1), "$1::text");
/// assert_eq!(placeholder(Column::ValidSince, 6), "$6::text::daterange");
/// assert_eq!(
///     placeholder(Column::Geometry, 8),
///     "ST_SetSRID(ST_GeomFromGeoJSON($8::text), 4326)"
/// );
/// ```
#[must_use]
pub fn placeholder(column: Column, index: usize) -> String {
    match column {
        Column::Id | Column::Dataset | Column::Name | Column::Type => format!("${index}::text"),
        Column::Data => format!("${index}::text::jsonb"),
        Column::ValidSince | Column::ValidUntil => format!("${index}::text::daterange"),
        Column::Geometry => geometry_from(&format!("${index}::text")),
    }
}

fn geometry_from(geojson: &str) -> String {
    format!("ST_SetSRID(ST_GeomFromGeoJSON({geojson}), {SRID})")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|text| !text.is_empty())
}

/// One entity flattened into column text.
///
/// # Examples
/// ```
/// use pitstore_core::PitEntity;
/// use pitstore_core::row::{Column, Row};
///
/// let entity = PitEntity::new("a1", "x").with_name("O'Brien");
/// let row = Row::from_entity(&entity, "d1");
/// assert_eq!(row.literal(Column::Name), "'O''Brien'");
/// assert_eq!(row.literal(Column::Data), "NULL");
/// assert_eq!(row.parameter(Column::Dataset), Some("d1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    id: String,
    dataset: String,
    name: Option<String>,
    kind: String,
    data: Option<String>,
    valid_since: Option<String>,
    valid_until: Option<String>,
    geometry: Option<String>,
}

impl Row {
    /// Flatten `entity` for storage under `dataset`.
    #[must_use]
    pub fn from_entity(entity: &PitEntity, dataset: &str) -> Self {
        Self {
            id: entity.id.clone(),
            dataset: dataset.to_owned(),
            name: entity.name.clone(),
            kind: entity.kind.clone(),
            data: entity.data.as_ref().map(ToString::to_string),
            valid_since: entity.valid_since.as_ref().map(DateRange::to_string),
            valid_until: entity.valid_until.as_ref().map(DateRange::to_string),
            geometry: entity.geometry.as_ref().map(ToString::to_string),
        }
    }

    /// Escaped literal expression for `column`.
    ///
    /// Dataset and type are always quoted; the remaining text columns go
    /// through [`escape_literal`], so empty values become `NULL`. Geometry is
    /// wrapped in a constructor call, or is the bare `NULL` keyword.
    #[must_use]
    pub fn literal(&self, column: Column) -> String {
        match column {
            Column::Id => escape_literal(Some(&self.id)),
            Column::Dataset => quote_literal(&self.dataset),
            Column::Name => escape_literal(self.name.as_deref()),
            Column::Type => quote_literal(&self.kind),
            Column::Data => escape_literal(self.data.as_deref()),
            Column::ValidSince => escape_literal(self.valid_since.as_deref()),
            Column::ValidUntil => escape_literal(self.valid_until.as_deref()),
            Column::Geometry => self
                .geometry
                .as_deref()
                .map_or_else(|| NULL_LITERAL.to_owned(), |geojson| {
                    geometry_from(&quote_literal(geojson))
                }),
        }
    }

    /// Parameter bound to `column`'s placeholder, `None` meaning SQL `NULL`.
    ///
    /// Follows the same rules as [`Row::literal`]: empty text binds as
    /// `NULL` except for dataset and type.
    #[must_use]
    pub fn parameter(&self, column: Column) -> Option<&str> {
        match column {
            Column::Id => non_empty(Some(&self.id)),
            Column::Dataset => Some(&self.dataset),
            Column::Name => non_empty(self.name.as_deref()),
            Column::Type => Some(&self.kind),
            Column::Data => non_empty(self.data.as_deref()),
            Column::ValidSince => non_empty(self.valid_since.as_deref()),
            Column::ValidUntil => non_empty(self.valid_until.as_deref()),
            Column::Geometry => self.geometry.as_deref(),
        }
    }

    /// Column/literal pairs in statement order.
    pub fn literals(&self) -> impl Iterator<Item = (Column, String)> + '_ {
        Column::ALL
            .into_iter()
            .map(move |column| (column, self.literal(column)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn full_entity() -> PitEntity {
        PitEntity::new("a1", "hg:Building")
            .with_name("O'Brien")
            .with_validity(
                Some(DateRange::new("1900-01-01", "1900-12-31")),
                Some(DateRange::new("1950-01-01", "1950-12-31")),
            )
            .with_data(json!({"note": r"C:\archive"}))
            .with_geometry(json!({"coordinates": [4.9, 52.37], "type": "Point"}))
    }

    #[rstest]
    fn literals_follow_column_order(full_entity: PitEntity) {
        let row = Row::from_entity(&full_entity, "d1");
        let columns: Vec<_> = row.literals().map(|(column, _)| column.name()).collect();
        assert_eq!(
            columns,
            [
                "id",
                "dataset",
                "name",
                "type",
                "data",
                "validSince",
                "validUntil",
                "geometry"
            ]
        );
    }

    #[rstest]
    fn renders_every_column(full_entity: PitEntity) {
        let row = Row::from_entity(&full_entity, "d1");
        let literals: Vec<_> = row.literals().map(|(_, literal)| literal).collect();
        assert_eq!(
            literals,
            [
                "'a1'".to_owned(),
                "'d1'".to_owned(),
                "'O''Brien'".to_owned(),
                "'hg:Building'".to_owned(),
                r#"E'{"note":"C:\\\\archive"}'"#.to_owned(),
                "'[1900-01-01, 1900-12-31]'".to_owned(),
                "'[1950-01-01, 1950-12-31]'".to_owned(),
                r#"ST_SetSRID(ST_GeomFromGeoJSON('{"coordinates":[4.9,52.37],"type":"Point"}'), 4326)"#
                    .to_owned(),
            ]
        );
    }

    #[rstest]
    fn absent_values_are_null() {
        let row = Row::from_entity(&PitEntity::new("a1", "x"), "d1");
        for column in [
            Column::Name,
            Column::Data,
            Column::ValidSince,
            Column::ValidUntil,
            Column::Geometry,
        ] {
            assert_eq!(row.literal(column), "NULL", "{column:?}");
            assert_eq!(row.parameter(column), None, "{column:?}");
        }
    }

    #[rstest]
    fn empty_strings_are_null_except_for_dataset_and_type() {
        let row = Row::from_entity(&PitEntity::new("", "").with_name(""), "");
        assert_eq!(row.literal(Column::Id), "NULL");
        assert_eq!(row.literal(Column::Name), "NULL");
        assert_eq!(row.literal(Column::Dataset), "''");
        assert_eq!(row.literal(Column::Type), "''");
        assert_eq!(row.parameter(Column::Id), None);
        assert_eq!(row.parameter(Column::Name), None);
        assert_eq!(row.parameter(Column::Dataset), Some(""));
        assert_eq!(row.parameter(Column::Type), Some(""));
    }

    #[rstest]
    fn type_and_dataset_are_escaped(full_entity: PitEntity) {
        let mut entity = full_entity;
        entity.kind = "x'); DROP TABLE pits; --".to_owned();
        let row = Row::from_entity(&entity, "d'1");
        assert_eq!(row.literal(Column::Type), "'x''); DROP TABLE pits; --'");
        assert_eq!(row.literal(Column::Dataset), "'d''1'");
    }

    #[rstest]
    fn parameters_carry_raw_text(full_entity: PitEntity) {
        let row = Row::from_entity(&full_entity, "d1");
        assert_eq!(row.parameter(Column::Name), Some("O'Brien"));
        assert_eq!(
            row.parameter(Column::ValidSince),
            Some("[1900-01-01, 1900-12-31]")
        );
        assert_eq!(
            row.parameter(Column::Geometry),
            Some(r#"{"coordinates":[4.9,52.37],"type":"Point"}"#)
        );
    }

    #[rstest]
    fn mutable_columns_exclude_keys() {
        assert!(!Column::MUTABLE.contains(&Column::Id));
        assert!(!Column::MUTABLE.contains(&Column::Dataset));
        assert_eq!(Column::MUTABLE.len(), Column::ALL.len() - 2);
    }
}
