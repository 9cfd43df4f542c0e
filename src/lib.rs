//! # TinyDB - A Small Single-File Relational Database
//!
//! TinyDB stores tables in a single file of 4096-byte pages and exposes a
//! five-statement SQL surface over them. The engineering lives in the
//! storage core: a pin-counted buffer pool, a bitmap free-space manager, a
//! slotted-page table heap, and a catalog that describes itself.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tinydb::Database;
//!
//! let mut db = Database::open("./my.db")?;
//! db.execute("CREATE TABLE users (id INTEGER, name VARCHAR(50))")?;
//! db.execute("INSERT INTO users VALUES (1, 'Alice')")?;
//!
//! let result = db.execute("SELECT * FROM users WHERE id = 1")?;
//! for row in &result.rows {
//!     println!("{row:?}");
//! }
//! db.close()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │        Shell (cli) / Database       │
//! ├─────────────────────────────────────┤
//! │   SQL Layer (lexer/parser/executor) │
//! ├─────────────────────────────────────┤
//! │   Catalog  │  Schema & Record Codec │
//! ├─────────────────────────────────────┤
//! │   Table Heap (slotted page chains)  │
//! ├─────────────────────────────────────┤
//! │   Buffer Pool (pin counts + LRU)    │
//! ├─────────────────────────────────────┤
//! │   Disk Layer │ Free-Space Bitmap    │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## On-Disk Format
//!
//! A flat sequence of 4 KiB pages: page 0 is the superblock (magic
//! `TINYDB01`, page-count watermark, catalog root), page 1 is the allocation
//! bitmap, and everything above is slotted pages chained into heaps. All
//! integers are little-endian. There is no WAL; durability is flush-on-
//! clean-shutdown.
//!
//! ## Module Overview
//!
//! - [`storage`]: disk layer, superblock, free-space bitmap, slotted pages,
//!   table heap
//! - [`buffer`]: LRU replacer, buffer pool, pin guards
//! - [`records`]: values, schemas, record codec
//! - [`catalog`]: self-describing system tables, bootstrap and recovery
//! - [`sql`]: lexer, parser, tree-walk executor
//! - [`cli`]: interactive shell

pub mod buffer;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod database;
pub mod records;
pub mod sql;
pub mod storage;

pub use database::Database;
