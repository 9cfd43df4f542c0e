//! # Records Module
//!
//! The type system and wire format for rows:
//!
//! - [`Value`]: a single typed cell (null, 32-bit integer, or string)
//! - [`Column`] / [`ColumnType`]: column metadata
//! - [`Schema`]: an ordered column list plus the record codec
//!
//! The codec is **not** self-describing — a record's bytes are meaningless
//! without the schema that wrote them. The catalog is responsible for pairing
//! heaps with their schemas.

mod schema;
mod types;

pub use schema::{Column, Schema};
pub use types::{ColumnType, Value};
