//! # Database Facade
//!
//! Wires the full stack together and exposes the one-call API the shell and
//! the integration tests use:
//!
//! ```text
//! Database::open(path)
//!     │
//!     ├── DiskManager        opens (or creates) the file
//!     ├── BufferPool         frames over the file
//!     ├── FreeSpaceManager   initialize(): superblock + bitmap on new files
//!     └── Catalog            bootstrap or recovery, per the superblock
//!
//! db.execute("INSERT INTO ...")   lex → parse → execute
//! ```
//!
//! ## Shutdown
//!
//! There is no write-ahead log; durability is "flush on clean shutdown".
//! [`Database::close`] flushes every resident page explicitly, and the
//! buffer pool's `Drop` repeats the flush as a best-effort backstop.

use std::path::Path;
use std::sync::Arc;

use eyre::{Result, WrapErr};

use crate::buffer::BufferPool;
use crate::catalog::Catalog;
use crate::config::DEFAULT_BUFFER_POOL_SIZE;
use crate::sql::{parse_statement, ExecutionEngine, ExecutionResult};
use crate::storage::{DiskManager, FreeSpaceManager};

pub struct Database {
    pool: Arc<BufferPool>,
    catalog: Catalog,
}

impl Database {
    /// Opens an existing database or creates a new one at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_pool_size(path, DEFAULT_BUFFER_POOL_SIZE)
    }

    pub fn open_with_pool_size(path: impl AsRef<Path>, pool_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let disk = Arc::new(DiskManager::open(path)?);
        let pool = Arc::new(BufferPool::new(pool_size, disk));

        let free_space = Arc::new(FreeSpaceManager::new(Arc::clone(&pool)));
        free_space
            .initialize()
            .wrap_err("failed to initialize free-space manager")?;

        let catalog = Catalog::open(Arc::clone(&pool), free_space)
            .wrap_err_with(|| format!("failed to open catalog of {}", path.display()))?;

        Ok(Self { pool, catalog })
    }

    /// Parses and executes one SQL statement.
    pub fn execute(&mut self, sql: &str) -> Result<ExecutionResult> {
        let statement = parse_statement(sql)?;
        ExecutionEngine::new(&mut self.catalog).execute(statement)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Flushes all cached pages and consumes the database.
    pub fn close(self) -> Result<()> {
        self.pool.flush_all_pages()
    }
}
