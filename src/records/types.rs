//! # Data Types and Values
//!
//! Two storable types, plus null:
//!
//! | Type      | Storage                         | Tag |
//! |-----------|---------------------------------|-----|
//! | INTEGER   | 4 bytes, signed, little-endian  | 1   |
//! | VARCHAR   | u32 length prefix + UTF-8 bytes | 2   |
//!
//! The numeric tag is what `__catalog_columns` persists for each column, so
//! it is part of the file format and must not be renumbered.

use eyre::{bail, Result};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer = 1,
    Varchar = 2,
}

impl ColumnType {
    /// The on-disk tag stored in the catalog.
    pub fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Result<Self> {
        match tag {
            1 => Ok(ColumnType::Integer),
            2 => Ok(ColumnType::Varchar),
            other => bail!("unknown column type tag {other}"),
        }
    }

    /// Serialized width of a non-null value, or `None` for variable-length.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ColumnType::Integer => Some(4),
            ColumnType::Varchar => None,
        }
    }

    pub fn is_variable(self) -> bool {
        self.fixed_size().is_none()
    }

    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Varchar => "VARCHAR",
        }
    }
}

/// One cell of a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Integer(i32),
    Varchar(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The type this value would occupy in a schema; `None` for null, which
    /// fits any column.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Varchar(_) => Some(ColumnType::Varchar),
        }
    }

    pub fn as_integer(&self) -> Result<i32> {
        match self {
            Value::Integer(v) => Ok(*v),
            other => bail!("value is not an INTEGER: {other:?}"),
        }
    }

    pub fn as_varchar(&self) -> Result<&str> {
        match self {
            Value::Varchar(s) => Ok(s),
            other => bail!("value is not a VARCHAR: {other:?}"),
        }
    }

    /// Payload bytes this value contributes to a record. Nulls contribute
    /// nothing beyond their bitmap bit (and offset slot, if variable).
    pub fn serialized_size(&self) -> usize {
        match self {
            Value::Null => 0,
            Value::Integer(_) => 4,
            Value::Varchar(s) => 4 + s.len(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Varchar(s) => write!(f, "{s}"),
        }
    }
}
