//! # CLI Module
//!
//! The interactive shell: a line-oriented REPL over the [`Database`] facade.
//!
//! ```text
//! tinydb> SELECT * FROM users WHERE id = 2
//! id      name    age
//! --      ----    ---
//! 2       Bob     30
//!
//! 1 row(s) returned.
//! ```
//!
//! Each input line is one statement, sent through lex → parse → execute.
//! Errors print and the loop continues; `quit` / `exit` leave, `help` lists
//! the supported statement forms. History persists across sessions via
//! rustyline.
//!
//! [`Database`]: crate::database::Database

pub mod repl;

pub use repl::Repl;
