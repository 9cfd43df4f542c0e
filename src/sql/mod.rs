//! # SQL Module
//!
//! The conventional front half of the engine: tokenize, parse, execute.
//!
//! ```text
//! "SELECT * FROM users WHERE id = 2"
//!     │
//!     ▼
//! Lexer      → [Keyword(Select), Star, Keyword(From), Ident("users"), ...]
//!     │
//!     ▼
//! Parser     → Statement::Select(SelectStmt { .. })
//!     │
//!     ▼
//! Executor   → sequential scan over the table heap, predicate per row
//!     │
//!     ▼
//! ExecutionResult { column_names, rows, rows_affected }
//! ```
//!
//! Five statement forms are supported: `CREATE TABLE`, `INSERT`, `SELECT`,
//! `DELETE`, and `UPDATE`, over the two storable types `INTEGER` and
//! `VARCHAR(n)`. Everything executes as a sequential scan; there is no
//! planner and no indexes.

pub mod ast;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::Statement;
pub use executor::{ExecutionEngine, ExecutionResult};
pub use lexer::Lexer;
pub use parser::Parser;

use eyre::Result;

/// Tokenizes and parses one statement.
pub fn parse_statement(sql: &str) -> Result<Statement> {
    let tokens = Lexer::new(sql).tokenize()?;
    Parser::new(tokens).parse()
}
