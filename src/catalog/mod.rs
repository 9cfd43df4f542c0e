//! # Catalog
//!
//! The metadata manager: which tables exist, what their schemas are, and
//! where each table's heap chain begins. All of it is persisted in the two
//! self-describing system tables (see [`system_tables`]), anchored by the
//! superblock.
//!
//! ## Bootstrap (new database)
//!
//! A database is *new* when the superblock's catalog pointer is still `-1`.
//! Bootstrap runs in a fixed order, because each step is what makes the next
//! one recoverable:
//!
//! 1. Allocate and format the first page of `__catalog_tables`.
//! 2. Allocate and format the first page of `__catalog_columns`.
//! 3. Point the superblock at the tables heap.
//! 4. Insert the self-describing rows: both meta-tables into
//!    `__catalog_tables`, and their columns into `__catalog_columns`.
//!
//! There is no write-ahead log; a crash mid-bootstrap leaves a file that
//! reopens as new (the pointer is written only in step 3) or, after step 3,
//! a catalog missing rows. The risk is accepted — see the design notes.
//!
//! ## Recovery (existing database)
//!
//! 1. Read `catalog_tables_page_id` from the superblock.
//! 2. Scan `__catalog_tables` to find `__catalog_columns`'s first page.
//! 3. Scan `__catalog_tables` again, materializing every user table
//!    (`table_id >= 2`): build its heap from `first_page_id` and its schema
//!    from the matching `__catalog_columns` rows sorted by `column_index`.
//! 4. Resume id assignment at `max(table_id) + 1`.
//!
//! ## Ownership
//!
//! The catalog holds the buffer pool and free-space manager by `Arc` and
//! owns one `TableHeap` per known table. Heaps share the pool; the pool
//! outlives everything that borrows pages from it.

pub mod system_tables;

use std::sync::Arc;

use eyre::{bail, ensure, Result, WrapErr};
use hashbrown::HashMap;

use crate::buffer::BufferPool;
use crate::config::{PageId, TableId, SUPERBLOCK_PAGE_ID};
use crate::records::{Column, ColumnType, Schema, Value};
use crate::storage::slotted::SlottedPageMut;
use crate::storage::{FreeSpaceManager, RecordId, Superblock, TableHeap};

use system_tables::{
    catalog_columns_schema, catalog_tables_schema, CATALOG_COLUMNS_ID, CATALOG_COLUMNS_NAME,
    CATALOG_TABLES_ID, CATALOG_TABLES_NAME, FIRST_USER_TABLE_ID, MAX_NAME_LENGTH,
};

pub struct Catalog {
    pool: Arc<BufferPool>,
    free_space: Arc<FreeSpaceManager>,
    tables_heap: TableHeap,
    columns_heap: TableHeap,
    tables_schema: Schema,
    columns_schema: Schema,
    table_ids: HashMap<String, TableId>,
    heaps: HashMap<TableId, TableHeap>,
    schemas: HashMap<TableId, Schema>,
    next_table_id: TableId,
}

impl Catalog {
    /// Opens the catalog over an initialized free-space manager, deciding
    /// between bootstrap and recovery from the superblock.
    pub fn open(pool: Arc<BufferPool>, free_space: Arc<FreeSpaceManager>) -> Result<Self> {
        let initialized = {
            let page = pool
                .fetch_page(SUPERBLOCK_PAGE_ID)?
                .ok_or_else(|| eyre::eyre!("superblock could not be pinned"))?;
            Superblock::from_bytes(page.data())?.is_initialized()
        };

        if initialized {
            Self::recover(pool, free_space).wrap_err("failed to recover catalog")
        } else {
            Self::bootstrap(pool, free_space).wrap_err("failed to bootstrap catalog")
        }
    }

    fn allocate_heap_page(
        pool: &BufferPool,
        free_space: &FreeSpaceManager,
    ) -> Result<PageId> {
        let Some(page_id) = free_space.allocate_page()? else {
            bail!("database is out of pages");
        };
        let Some(mut page) = pool.new_page(page_id)? else {
            free_space.deallocate_page(page_id)?;
            bail!("buffer pool exhausted allocating catalog page");
        };
        SlottedPageMut::new(page.data_mut()).init();
        Ok(page_id)
    }

    fn bootstrap(pool: Arc<BufferPool>, free_space: Arc<FreeSpaceManager>) -> Result<Self> {
        let tables_page = Self::allocate_heap_page(&pool, &free_space)?;
        let columns_page = Self::allocate_heap_page(&pool, &free_space)?;

        // The superblock must name the tables heap before the rows go in;
        // until this write, reopening the file starts bootstrap over.
        {
            let mut page = pool
                .fetch_page(SUPERBLOCK_PAGE_ID)?
                .ok_or_else(|| eyre::eyre!("superblock could not be pinned"))?;
            Superblock::from_bytes_mut(page.data_mut())?
                .set_catalog_tables_page_id(tables_page);
        }

        let catalog = Self {
            tables_heap: TableHeap::new(Arc::clone(&pool), Arc::clone(&free_space), tables_page),
            columns_heap: TableHeap::new(Arc::clone(&pool), Arc::clone(&free_space), columns_page),
            tables_schema: catalog_tables_schema(),
            columns_schema: catalog_columns_schema(),
            table_ids: HashMap::new(),
            heaps: HashMap::new(),
            schemas: HashMap::new(),
            next_table_id: FIRST_USER_TABLE_ID,
            pool,
            free_space,
        };

        catalog.persist_table_row(CATALOG_TABLES_ID, CATALOG_TABLES_NAME, tables_page)?;
        catalog.persist_table_row(CATALOG_COLUMNS_ID, CATALOG_COLUMNS_NAME, columns_page)?;
        catalog.persist_column_rows(CATALOG_TABLES_ID, &catalog.tables_schema)?;
        catalog.persist_column_rows(CATALOG_COLUMNS_ID, &catalog.columns_schema)?;

        Ok(catalog)
    }

    fn recover(pool: Arc<BufferPool>, free_space: Arc<FreeSpaceManager>) -> Result<Self> {
        let tables_page = {
            let page = pool
                .fetch_page(SUPERBLOCK_PAGE_ID)?
                .ok_or_else(|| eyre::eyre!("superblock could not be pinned"))?;
            Superblock::from_bytes(page.data())?.catalog_tables_page_id()
        };

        let tables_schema = catalog_tables_schema();
        let columns_schema = catalog_columns_schema();
        let tables_heap =
            TableHeap::new(Arc::clone(&pool), Arc::clone(&free_space), tables_page);

        let mut columns_page = None;
        for entry in tables_heap.iter() {
            let (_, bytes) = entry?;
            let (_, name, first_page) = decode_table_row(&tables_schema, &bytes)?;
            if name == CATALOG_COLUMNS_NAME {
                columns_page = Some(first_page);
                break;
            }
        }
        let columns_page = columns_page
            .ok_or_else(|| eyre::eyre!("catalog is corrupt: {CATALOG_COLUMNS_NAME} row missing"))?;

        let columns_heap =
            TableHeap::new(Arc::clone(&pool), Arc::clone(&free_space), columns_page);

        // All column rows up front; each table filters and sorts its own.
        let mut all_columns: Vec<(TableId, String, ColumnType, u32, i32)> = Vec::new();
        for entry in columns_heap.iter() {
            let (_, bytes) = entry?;
            all_columns.push(decode_column_row(&columns_schema, &bytes)?);
        }

        let mut catalog = Self {
            tables_heap,
            columns_heap,
            tables_schema,
            columns_schema,
            table_ids: HashMap::new(),
            heaps: HashMap::new(),
            schemas: HashMap::new(),
            next_table_id: FIRST_USER_TABLE_ID,
            pool: Arc::clone(&pool),
            free_space: Arc::clone(&free_space),
        };

        let mut table_rows = Vec::new();
        for entry in catalog.tables_heap.iter() {
            let (_, bytes) = entry?;
            table_rows.push(decode_table_row(&catalog.tables_schema, &bytes)?);
        }

        for (table_id, name, first_page) in table_rows {
            if table_id < FIRST_USER_TABLE_ID {
                continue;
            }

            let mut columns: Vec<(i32, Column)> = all_columns
                .iter()
                .filter(|(id, ..)| *id == table_id)
                .map(|(_, name, column_type, max_length, index)| {
                    // The nullable bit is not persisted; recovered columns
                    // are non-nullable.
                    let column =
                        Column::new(name.clone(), *column_type, *max_length).not_null();
                    (*index, column)
                })
                .collect();
            columns.sort_by_key(|(index, _)| *index);

            let schema = Schema::new(columns.into_iter().map(|(_, c)| c).collect());
            let heap = TableHeap::new(Arc::clone(&pool), Arc::clone(&free_space), first_page);

            catalog.table_ids.insert(name, table_id);
            catalog.heaps.insert(table_id, heap);
            catalog.schemas.insert(table_id, schema);
            catalog.next_table_id = catalog.next_table_id.max(table_id + 1);
        }

        Ok(catalog)
    }

    fn persist_table_row(&self, table_id: TableId, name: &str, first_page: PageId) -> Result<RecordId> {
        let row = self.tables_schema.serialize(&[
            Value::Integer(table_id),
            Value::Varchar(name.to_string()),
            Value::Integer(first_page),
        ])?;
        self.tables_heap.insert(&row)
    }

    fn persist_column_rows(&self, table_id: TableId, schema: &Schema) -> Result<Vec<RecordId>> {
        let mut rids = Vec::with_capacity(schema.column_count());
        for (index, column) in schema.columns().iter().enumerate() {
            let row = self.columns_schema.serialize(&[
                Value::Integer(table_id),
                Value::Varchar(column.name().to_string()),
                Value::Integer(column.column_type().tag()),
                Value::Integer(column.max_length() as i32),
                Value::Integer(index as i32),
            ])?;
            rids.push(self.columns_heap.insert(&row)?);
        }
        Ok(rids)
    }

    /// Creates a user table: allocates its first page, persists its rows in
    /// the meta-tables, and registers it in memory. Partial persistence is
    /// rolled back by tombstoning the rows and releasing the page.
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<TableId> {
        ensure!(
            !self.table_ids.contains_key(name),
            "table '{name}' already exists"
        );
        ensure!(
            name.len() <= MAX_NAME_LENGTH as usize,
            "table name '{name}' exceeds {MAX_NAME_LENGTH} bytes"
        );
        for column in schema.columns() {
            ensure!(
                column.name().len() <= MAX_NAME_LENGTH as usize,
                "column name '{}' exceeds {MAX_NAME_LENGTH} bytes",
                column.name()
            );
        }

        let table_id = self.next_table_id;
        let first_page = Self::allocate_heap_page(&self.pool, &self.free_space)?;

        let table_rid = match self.persist_table_row(table_id, name, first_page) {
            Ok(rid) => rid,
            Err(e) => {
                self.free_space.deallocate_page(first_page)?;
                self.pool.delete_page(first_page);
                return Err(e.wrap_err(format!("failed to persist table '{name}'")));
            }
        };

        if let Err(e) = self.persist_column_rows(table_id, &schema) {
            // Tombstone whatever made it in; the ids stay burned.
            self.tables_heap.delete(table_rid)?;
            self.rollback_column_rows(table_id)?;
            self.free_space.deallocate_page(first_page)?;
            self.pool.delete_page(first_page);
            return Err(e.wrap_err(format!("failed to persist columns of '{name}'")));
        }

        self.next_table_id += 1;
        let heap = TableHeap::new(
            Arc::clone(&self.pool),
            Arc::clone(&self.free_space),
            first_page,
        );
        self.table_ids.insert(name.to_string(), table_id);
        self.heaps.insert(table_id, heap);
        self.schemas.insert(table_id, schema);

        Ok(table_id)
    }

    fn rollback_column_rows(&self, table_id: TableId) -> Result<()> {
        let rids: Vec<RecordId> = self
            .columns_heap
            .iter()
            .filter_map(|entry| entry.ok())
            .filter(|(_, bytes)| {
                decode_column_row(&self.columns_schema, bytes)
                    .map(|(id, ..)| id == table_id)
                    .unwrap_or(false)
            })
            .map(|(rid, _)| rid)
            .collect();
        for rid in rids {
            self.columns_heap.delete(rid)?;
        }
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Option<&TableHeap> {
        let table_id = self.table_ids.get(name)?;
        self.heaps.get(table_id)
    }

    pub fn get_schema(&self, name: &str) -> Option<&Schema> {
        let table_id = self.table_ids.get(name)?;
        self.schemas.get(table_id)
    }

    /// User table names, unordered.
    pub fn table_names(&self) -> Vec<&str> {
        self.table_ids.keys().map(String::as_str).collect()
    }
}

fn decode_table_row(schema: &Schema, bytes: &[u8]) -> Result<(TableId, String, PageId)> {
    let values = schema.deserialize(bytes)?;
    ensure!(values.len() == 3, "malformed __catalog_tables row");
    Ok((
        values[0].as_integer()?,
        values[1].as_varchar()?.to_string(),
        values[2].as_integer()?,
    ))
}

fn decode_column_row(
    schema: &Schema,
    bytes: &[u8],
) -> Result<(TableId, String, ColumnType, u32, i32)> {
    let values = schema.deserialize(bytes)?;
    ensure!(values.len() == 5, "malformed __catalog_columns row");
    Ok((
        values[0].as_integer()?,
        values[1].as_varchar()?.to_string(),
        ColumnType::from_tag(values[2].as_integer()?)?,
        values[3].as_integer()? as u32,
        values[4].as_integer()?,
    ))
}
