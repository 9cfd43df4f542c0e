//! # TinyDB Shell Entry Point
//!
//! ```bash
//! tinydb              # opens ./tinydb.db
//! tinydb path/to.db   # opens (or creates) the given file
//! ```
//!
//! Exit code 1 on fatal initialization or shutdown errors; 0 otherwise.

use eyre::Result;
use tinydb::cli::Repl;
use tinydb::config::DEFAULT_DB_FILE;
use tinydb::Database;

fn main() {
    if let Err(e) = run() {
        eprintln!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let db_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DB_FILE.to_string());

    let db = Database::open(&db_file)?;
    let mut repl = Repl::new(db)?;
    repl.run()?;
    repl.into_database().close()?;

    Ok(())
}
