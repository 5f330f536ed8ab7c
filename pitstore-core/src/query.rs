//! Compilation of PIT changes into SQL statements.
//!
//! `create` and `update` share the upsert template, keyed by
//! `(id, dataset)`; `delete` removes by the same key. Statements end in `;`
//! so inline statements can be joined into a single multi-statement text.

use crate::literal::escape_literal;
use crate::row::{Column, Row, placeholder};
use crate::{PitChange, TableName};

/// How values reach the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StatementStyle {
    /// Values are escaped and spliced into the statement text.
    Inline,
    /// Values travel as bound text parameters.
    #[default]
    Bound,
}

/// A single compiled statement.
///
/// Inline statements never carry parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    params: Vec<Option<String>>,
}

impl Statement {
    /// Statement text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound parameters in placeholder order; `None` binds SQL `NULL`.
    #[must_use]
    pub fn params(&self) -> &[Option<String>] {
        &self.params
    }
}

/// Renders [`PitChange`]s for one table in one style.
///
/// # Examples
/// ```
/// use pitstore_core::{PitChange, QueryCompiler, StatementStyle, TableName};
///
/// let compiler = QueryCompiler::new(TableName::default(), StatementStyle::Inline);
/// let statement = compiler.compile(&PitChange::Delete {
///     dataset: "d1".into(),
///     id: "a1".into(),
/// });
/// assert_eq!(
///     statement.sql(),
///     "DELETE FROM pits WHERE id = 'a1' AND dataset = 'd1';"
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCompiler {
    table: TableName,
    style: StatementStyle,
}

impl QueryCompiler {
    /// Create a compiler targeting `table`.
    #[must_use]
    pub const fn new(table: TableName, style: StatementStyle) -> Self {
        Self { table, style }
    }

    /// Target table.
    #[must_use]
    pub const fn table(&self) -> &TableName {
        &self.table
    }

    /// Rendering style.
    #[must_use]
    pub const fn style(&self) -> StatementStyle {
        self.style
    }

    /// Compile one change into exactly one statement.
    #[must_use]
    pub fn compile(&self, change: &PitChange) -> Statement {
        match change {
            PitChange::Upsert { dataset, entity } => self.upsert(&Row::from_entity(entity, dataset)),
            PitChange::Delete { dataset, id } => self.delete(id, dataset),
        }
    }

    fn upsert(&self, row: &Row) -> Statement {
        let columns = Column::ALL.map(Column::name).join(", ");
        let (values, params) = match self.style {
            StatementStyle::Inline => (
                row.literals()
                    .map(|(_, literal)| literal)
                    .collect::<Vec<_>>()
                    .join(", "),
                Vec::new(),
            ),
            StatementStyle::Bound => (
                Column::ALL
                    .iter()
                    .zip(1..)
                    .map(|(column, index)| placeholder(*column, index))
                    .collect::<Vec<_>>()
                    .join(", "),
                Column::ALL
                    .iter()
                    .map(|column| row.parameter(*column).map(str::to_owned))
                    .collect(),
            ),
        };
        let assignments = Column::MUTABLE
            .iter()
            .map(|column| format!("{0} = EXCLUDED.{0}", column.name()))
            .collect::<Vec<_>>()
            .join(", ");

        Statement {
            sql: format!(
                "INSERT INTO {table} ({columns}) VALUES ({values}) \
                 ON CONFLICT (id, dataset) DO UPDATE SET {assignments};",
                table = self.table,
            ),
            params,
        }
    }

    fn delete(&self, id: &str, dataset: &str) -> Statement {
        let table = &self.table;
        match self.style {
            StatementStyle::Inline => Statement {
                sql: format!(
                    "DELETE FROM {table} WHERE id = {} AND dataset = {};",
                    escape_literal(Some(id)),
                    escape_literal(Some(dataset)),
                ),
                params: Vec::new(),
            },
            StatementStyle::Bound => Statement {
                sql: format!("DELETE FROM {table} WHERE id = $1::text AND dataset = $2::text;"),
                params: [id, dataset]
                    .into_iter()
                    .map(|value| Some(value).filter(|text| !text.is_empty()).map(str::to_owned))
                    .collect(),
            },
        }
    }
}
