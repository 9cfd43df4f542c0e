//! # System Tables
//!
//! Two meta-tables describe every table in the database, themselves
//! included:
//!
//! ```sql
//! __catalog_tables (
//!     table_id       INTEGER,      -- 0 and 1 are the meta-tables
//!     table_name     VARCHAR(64),
//!     first_page_id  INTEGER       -- head of the table's heap chain
//! )
//!
//! __catalog_columns (
//!     table_id       INTEGER,
//!     column_name    VARCHAR(64),
//!     column_type    INTEGER,      -- ColumnType tag: 1 INTEGER, 2 VARCHAR
//!     column_length  INTEGER,      -- declared max length, VARCHAR only
//!     column_index   INTEGER       -- position within the table
//! )
//! ```
//!
//! ## Self-Description
//!
//! `__catalog_tables` contains its own row, pointing at its own first page.
//! The superblock's `catalog_tables_page_id` is the only bootstrap anchor:
//! recovery reads it, scans `__catalog_tables` to locate
//! `__catalog_columns`, and from there reconstructs every schema.
//!
//! Nullability is **not** persisted; recovered user columns come back as
//! non-nullable. That asymmetry is inherited from the file format.

use crate::config::TableId;
use crate::records::{Column, Schema};

pub const CATALOG_TABLES_NAME: &str = "__catalog_tables";
pub const CATALOG_COLUMNS_NAME: &str = "__catalog_columns";

pub const CATALOG_TABLES_ID: TableId = 0;
pub const CATALOG_COLUMNS_ID: TableId = 1;

/// User tables are numbered from here.
pub const FIRST_USER_TABLE_ID: TableId = 2;

/// Longest persistable table or column name.
pub const MAX_NAME_LENGTH: u32 = 64;

pub fn catalog_tables_schema() -> Schema {
    Schema::new(vec![
        Column::integer("table_id").not_null(),
        Column::varchar("table_name", MAX_NAME_LENGTH).not_null(),
        Column::integer("first_page_id").not_null(),
    ])
}

pub fn catalog_columns_schema() -> Schema {
    Schema::new(vec![
        Column::integer("table_id").not_null(),
        Column::varchar("column_name", MAX_NAME_LENGTH).not_null(),
        Column::integer("column_type").not_null(),
        Column::integer("column_length").not_null(),
        Column::integer("column_index").not_null(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::ColumnType;

    #[test]
    fn meta_schemas_have_the_documented_shapes() {
        let tables = catalog_tables_schema();
        assert_eq!(tables.column_count(), 3);
        assert_eq!(tables.column(1).unwrap().column_type(), ColumnType::Varchar);
        assert_eq!(tables.column(1).unwrap().max_length(), 64);

        let columns = catalog_columns_schema();
        assert_eq!(columns.column_count(), 5);
        assert_eq!(columns.column_index("column_index"), Some(4));
    }

    #[test]
    fn meta_table_ids_precede_user_ids() {
        assert!(CATALOG_TABLES_ID < FIRST_USER_TABLE_ID);
        assert!(CATALOG_COLUMNS_ID < FIRST_USER_TABLE_ID);
    }
}
