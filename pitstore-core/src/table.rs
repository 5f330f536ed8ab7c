//! Validated table identifiers.
//!
//! Statements splice the table name in unquoted, so only lowercase ASCII
//! identifiers are accepted. This keeps the name stable under PostgreSQL's
//! case folding and lets catalogue lookups compare it verbatim.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Table written when no other name is configured.
pub const DEFAULT_TABLE: &str = "pits";

/// PostgreSQL truncates identifiers beyond `NAMEDATALEN - 1` bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// Errors returned by [`TableName::new`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableNameError {
    /// No name was supplied.
    #[error("table name must not be empty")]
    Empty,
    /// The name exceeds PostgreSQL's identifier limit.
    #[error("table name is {len} bytes long; the limit is 63")]
    TooLong {
        /// Length of the rejected name in bytes.
        len: usize,
    },
    /// The name contains a character outside `[a-z0-9_]` or starts with a digit.
    #[error("table name {name:?} contains invalid character {character:?}")]
    InvalidCharacter {
        /// The rejected name.
        name: String,
        /// First offending character.
        character: char,
    },
}

/// Name of the table holding PIT rows.
///
/// # Examples
/// ```
/// use pitstore_core::TableName;
///
/// let table = TableName::new("pits_staging")?;
/// assert_eq!(table.as_str(), "pits_staging");
/// assert_eq!(table.index_name("gix"), "pits_staging_gix");
/// assert!(TableName::new("pits; DROP").is_err());
/// # Ok::<(), pitstore_core::TableNameError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Validate and wrap a table name.
    pub fn new(name: impl Into<String>) -> Result<Self, TableNameError> {
        let owned: String = name.into();
        let mut chars = owned.chars();
        let Some(first) = chars.next() else {
            return Err(TableNameError::Empty);
        };
        if owned.len() > MAX_IDENTIFIER_LEN {
            return Err(TableNameError::TooLong { len: owned.len() });
        }
        let invalid = if first.is_ascii_lowercase() || first == '_' {
            chars.find(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || *ch == '_'))
        } else {
            Some(first)
        };
        match invalid {
            Some(character) => Err(TableNameError::InvalidCharacter {
                name: owned,
                character,
            }),
            None => Ok(Self(owned)),
        }
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the name of a table-scoped object such as an index or constraint.
    #[must_use]
    pub fn index_name(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.0)
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self(DEFAULT_TABLE.to_owned())
    }
}

impl FromStr for TableName {
    type Err = TableNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
