//! # REPL
//!
//! Reads whole-line statements, executes them, and prints results as
//! tab-separated columns under a dashed header. Nulls print as `NULL`.
//!
//! The special commands `quit`, `exit`, and `help` are matched before any
//! SQL processing. Everything else goes to the executor; an error prints
//! without ending the session.

use std::path::PathBuf;

use eyre::{Result, WrapErr};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::database::Database;
use crate::sql::ExecutionResult;

const PROMPT: &str = "tinydb> ";

pub struct Repl {
    db: Database,
    editor: DefaultEditor,
    history_path: PathBuf,
}

impl Repl {
    pub fn new(db: Database) -> Result<Self> {
        let mut editor = DefaultEditor::new().wrap_err("failed to initialize line editor")?;
        let history_path = history_path();
        let _ = editor.load_history(&history_path);

        Ok(Self {
            db,
            editor,
            history_path,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        println!("TinyDB - A Simple Database Management System");
        println!("Type 'quit' or 'exit' to leave, 'help' for help.");
        println!();

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    self.editor.add_history_entry(input).ok();

                    match input {
                        "quit" | "exit" => {
                            println!("Goodbye!");
                            break;
                        }
                        "help" => print_help(),
                        sql => self.execute(sql),
                    }
                }
                Err(ReadlineError::Interrupted) => println!("^C"),
                Err(ReadlineError::Eof) => {
                    println!("Goodbye!");
                    break;
                }
                Err(err) => {
                    eprintln!("Error reading input: {err}");
                    break;
                }
            }
        }

        if let Err(e) = self.editor.save_history(&self.history_path) {
            eprintln!("Warning: could not save history: {e}");
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str) {
        match self.db.execute(sql) {
            Ok(result) => print_result(&result),
            Err(err) => println!("Error: {err}"),
        }
    }

    /// Flushes and consumes the shell's database.
    pub fn into_database(self) -> Database {
        self.db
    }
}

fn print_result(result: &ExecutionResult) {
    if result.column_names.is_empty() {
        println!();
        print!("Query executed successfully.");
        if result.rows_affected > 0 {
            print!(" {} row(s) affected.", result.rows_affected);
        }
        println!();
        return;
    }

    println!("{}", result.column_names.join("\t"));
    println!(
        "{}",
        result
            .column_names
            .iter()
            .map(|name| "-".repeat(name.len()))
            .collect::<Vec<_>>()
            .join("\t")
    );
    for row in &result.rows {
        println!(
            "{}",
            row.iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\t")
        );
    }
    println!();
    println!("{} row(s) returned.", result.rows.len());
}

fn print_help() {
    println!("TinyDB supports the following SQL statements:");
    println!("  CREATE TABLE table_name (column_name type [NOT NULL], ...)");
    println!("  INSERT INTO table_name [(col1, col2)] VALUES (value1, value2)");
    println!("  SELECT * FROM table_name [WHERE condition]");
    println!("  SELECT col1, col2 FROM table_name [WHERE condition]");
    println!("  UPDATE table_name SET col = value [, ...] [WHERE condition]");
    println!("  DELETE FROM table_name [WHERE condition]");
    println!();
    println!("Supported types: INTEGER, VARCHAR(n)");
    println!("Supported operators: =, !=, <, <=, >, >=, AND, OR, NOT");
    println!();
}

fn history_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join(".tinydb_history");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tinydb_history");
    }
    PathBuf::from(".tinydb_history")
}
