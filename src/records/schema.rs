//! # Schema and Record Codec
//!
//! A [`Schema`] is an ordered list of columns plus the serialization rules
//! for rows of that shape.
//!
//! ## Record Layout
//!
//! For a schema of N columns, V of them variable-length:
//!
//! ```text
//! +-------------+------------------+---------------+--------------------+
//! | null bitmap | var offset table | fixed columns | var columns        |
//! | ceil(N/8) B | V * 4 B          | 4 B per live  | (u32 len + bytes)  |
//! |             |                  | INTEGER       | per live VARCHAR   |
//! +-------------+------------------+---------------+--------------------+
//! ```
//!
//! - Bitmap bit `i` (LSB-first within each byte) is 1 iff column `i` is null.
//! - Offset slot `j` belongs to the `j`-th variable column in schema order
//!   and points, from the record base, at that value's length prefix. Null
//!   variable columns keep their slot (zeroed) so the table's shape depends
//!   only on the schema.
//! - Null values contribute no payload bytes at all.
//!
//! The codec is schema-driven on both sides; nothing in the bytes identifies
//! the schema.

use eyre::{bail, ensure, Result};

use crate::records::types::{ColumnType, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    column_type: ColumnType,
    max_length: u32,
    nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType, max_length: u32) -> Self {
        Self {
            name: name.into(),
            column_type,
            max_length,
            nullable: true,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer, 0)
    }

    pub fn varchar(name: impl Into<String>, max_length: u32) -> Self {
        Self::new(name, ColumnType::Varchar, max_length)
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    /// Declared maximum length; meaningful for VARCHAR only.
    pub fn max_length(&self) -> u32 {
        self.max_length
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
    var_column_count: usize,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let var_column_count = columns
            .iter()
            .filter(|c| c.column_type().is_variable())
            .count();
        Self {
            columns,
            var_column_count,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn var_column_count(&self) -> usize {
        self.var_column_count
    }

    pub fn null_bitmap_size(&self) -> usize {
        self.columns.len().div_ceil(8)
    }

    fn header_size(&self) -> usize {
        self.null_bitmap_size() + self.var_column_count * 4
    }

    fn check_values(&self, values: &[Value]) -> Result<()> {
        ensure!(
            values.len() == self.columns.len(),
            "value count {} does not match schema column count {}",
            values.len(),
            self.columns.len()
        );
        for (column, value) in self.columns.iter().zip(values) {
            if let Some(value_type) = value.column_type() {
                ensure!(
                    value_type == column.column_type(),
                    "column '{}' is {} but value is {}",
                    column.name(),
                    column.column_type().name(),
                    value_type.name()
                );
            }
        }
        Ok(())
    }

    /// Exact byte length `serialize` would produce for these values.
    pub fn serialized_size(&self, values: &[Value]) -> Result<usize> {
        self.check_values(values)?;
        Ok(self.header_size() + values.iter().map(Value::serialized_size).sum::<usize>())
    }

    /// Largest record any row of this schema can produce, with every VARCHAR
    /// at its declared maximum.
    pub fn max_record_size(&self) -> usize {
        self.header_size()
            + self
                .columns
                .iter()
                .map(|c| match c.column_type().fixed_size() {
                    Some(width) => width,
                    None => 4 + c.max_length() as usize,
                })
                .sum::<usize>()
    }

    pub fn serialize(&self, values: &[Value]) -> Result<Vec<u8>> {
        self.check_values(values)?;

        let size = self.header_size() + values.iter().map(Value::serialized_size).sum::<usize>();
        let mut buf = vec![0u8; size];

        for (i, value) in values.iter().enumerate() {
            if value.is_null() {
                buf[i / 8] |= 1 << (i % 8);
            }
        }

        let offset_table_base = self.null_bitmap_size();
        let mut cursor = self.header_size();

        // Fixed columns first, in schema order.
        for (column, value) in self.columns.iter().zip(values) {
            if column.column_type().is_variable() || value.is_null() {
                continue;
            }
            match value {
                Value::Integer(v) => {
                    buf[cursor..cursor + 4].copy_from_slice(&v.to_le_bytes());
                    cursor += 4;
                }
                _ => bail!("type check let a non-INTEGER into a fixed column"),
            }
        }

        // Then variable columns, recording each offset in its slot.
        let mut var_index = 0;
        for (column, value) in self.columns.iter().zip(values) {
            if !column.column_type().is_variable() {
                continue;
            }
            if let Value::Varchar(s) = value {
                let slot = offset_table_base + var_index * 4;
                buf[slot..slot + 4].copy_from_slice(&(cursor as u32).to_le_bytes());

                buf[cursor..cursor + 4].copy_from_slice(&(s.len() as u32).to_le_bytes());
                cursor += 4;
                buf[cursor..cursor + s.len()].copy_from_slice(s.as_bytes());
                cursor += s.len();
            }
            var_index += 1;
        }

        Ok(buf)
    }

    pub fn deserialize(&self, data: &[u8]) -> Result<Vec<Value>> {
        let header = self.header_size();
        ensure!(
            data.len() >= header,
            "record of {} bytes is shorter than the {}-byte header",
            data.len(),
            header
        );

        let bitmap = &data[..self.null_bitmap_size()];
        let offset_table_base = self.null_bitmap_size();

        let mut values = Vec::with_capacity(self.columns.len());
        let mut fixed_cursor = header;
        let mut var_index = 0;

        for (i, column) in self.columns.iter().enumerate() {
            let is_null = bitmap[i / 8] & (1 << (i % 8)) != 0;

            if is_null {
                if column.column_type().is_variable() {
                    var_index += 1;
                }
                values.push(Value::Null);
                continue;
            }

            match column.column_type() {
                ColumnType::Integer => {
                    ensure!(
                        fixed_cursor + 4 <= data.len(),
                        "record truncated in column '{}'",
                        column.name()
                    );
                    let v = i32::from_le_bytes(
                        data[fixed_cursor..fixed_cursor + 4].try_into().unwrap(),
                    );
                    fixed_cursor += 4;
                    values.push(Value::Integer(v));
                }
                ColumnType::Varchar => {
                    let slot = offset_table_base + var_index * 4;
                    let offset =
                        u32::from_le_bytes(data[slot..slot + 4].try_into().unwrap()) as usize;
                    var_index += 1;

                    ensure!(
                        offset + 4 <= data.len(),
                        "record truncated in column '{}'",
                        column.name()
                    );
                    let len =
                        u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
                    ensure!(
                        offset + 4 + len <= data.len(),
                        "record truncated in column '{}'",
                        column.name()
                    );
                    let s = std::str::from_utf8(&data[offset + 4..offset + 4 + len])
                        .map_err(|e| eyre::eyre!("column '{}' is not UTF-8: {e}", column.name()))?;
                    values.push(Value::Varchar(s.to_string()));
                }
            }
        }

        Ok(values)
    }
}
