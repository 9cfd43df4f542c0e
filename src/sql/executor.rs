//! # Execution Engine
//!
//! Tree-walk executor over the catalog and table heaps. Every statement runs
//! as a sequential scan; there is no planner, no indexes, and no join.
//!
//! ## Predicate Semantics
//!
//! A WHERE clause evaluates to a [`Value`]; the row qualifies iff the result
//! is a **non-zero INTEGER**. Null, VARCHAR, and zero all exclude the row —
//! SQL's three-valued logic collapsed to false at the filter boundary.
//!
//! - Comparisons yield `Integer(0)` / `Integer(1)`. Comparing null, or
//!   values of different types, yields `Null`.
//! - `AND` / `OR` collapse each operand to a boolean first (null and
//!   non-integers count as false) and combine from there.
//! - `NOT` of a non-integer is `Null`.
//!
//! ## Mutation Under Iteration
//!
//! `DELETE` and `UPDATE` never mutate while the scan is live: they collect
//! the matching record ids (and row values) first, close the scan, then
//! apply the changes. The heap iterator has no isolation from writers, so
//! this ordering is what keeps the scan well-defined.

use eyre::{bail, ensure, Result};

use crate::catalog::Catalog;
use crate::records::{Schema, Value};
use crate::storage::{RecordId, TableHeap};

use super::ast::{
    BinaryOp, CreateTableStmt, DeleteStmt, Expr, InsertStmt, Projection, SelectStmt, Statement,
    UpdateStmt,
};

/// Outcome of one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    /// Header row for result sets; empty for DML.
    pub column_names: Vec<String>,
    /// Result rows; empty for DML.
    pub rows: Vec<Vec<Value>>,
    pub rows_affected: usize,
}

impl ExecutionResult {
    fn affected(rows_affected: usize) -> Self {
        Self {
            column_names: Vec::new(),
            rows: Vec::new(),
            rows_affected,
        }
    }
}

pub struct ExecutionEngine<'a> {
    catalog: &'a mut Catalog,
}

impl<'a> ExecutionEngine<'a> {
    pub fn new(catalog: &'a mut Catalog) -> Self {
        Self { catalog }
    }

    pub fn execute(&mut self, statement: Statement) -> Result<ExecutionResult> {
        match statement {
            Statement::CreateTable(stmt) => self.execute_create_table(stmt),
            Statement::Insert(stmt) => self.execute_insert(stmt),
            Statement::Select(stmt) => self.execute_select(stmt),
            Statement::Delete(stmt) => self.execute_delete(stmt),
            Statement::Update(stmt) => self.execute_update(stmt),
        }
    }

    fn resolve(&self, table: &str) -> Result<(&TableHeap, &Schema)> {
        let heap = self
            .catalog
            .get_table(table)
            .ok_or_else(|| eyre::eyre!("table '{table}' does not exist"))?;
        let schema = self
            .catalog
            .get_schema(table)
            .ok_or_else(|| eyre::eyre!("table '{table}' has no schema"))?;
        Ok((heap, schema))
    }

    fn execute_create_table(&mut self, stmt: CreateTableStmt) -> Result<ExecutionResult> {
        let columns = stmt
            .columns
            .into_iter()
            .map(|spec| {
                crate::records::Column::new(spec.name, spec.column_type, spec.max_length)
                    .with_nullable(!spec.not_null)
            })
            .collect();

        self.catalog.create_table(&stmt.table, Schema::new(columns))?;
        Ok(ExecutionResult::affected(0))
    }

    fn execute_insert(&mut self, stmt: InsertStmt) -> Result<ExecutionResult> {
        let (heap, schema) = self.resolve(&stmt.table)?;

        let mut row = vec![Value::Null; schema.column_count()];
        match &stmt.columns {
            Some(names) => {
                ensure!(
                    names.len() == stmt.values.len(),
                    "{} columns listed but {} values given",
                    names.len(),
                    stmt.values.len()
                );
                for (name, expr) in names.iter().zip(&stmt.values) {
                    let index = schema.column_index(name).ok_or_else(|| {
                        eyre::eyre!("table '{}' has no column '{name}'", stmt.table)
                    })?;
                    row[index] = evaluate(expr, None, None)?;
                }
            }
            None => {
                ensure!(
                    stmt.values.len() == schema.column_count(),
                    "table '{}' has {} columns but {} values were given",
                    stmt.table,
                    schema.column_count(),
                    stmt.values.len()
                );
                for (index, expr) in stmt.values.iter().enumerate() {
                    row[index] = evaluate(expr, None, None)?;
                }
            }
        }

        check_row(schema, &row)?;
        let bytes = schema.serialize(&row)?;
        heap.insert(&bytes)?;

        Ok(ExecutionResult::affected(1))
    }

    fn execute_select(&mut self, stmt: SelectStmt) -> Result<ExecutionResult> {
        let (heap, schema) = self.resolve(&stmt.table)?;

        let projection: Vec<usize> = match &stmt.projection {
            Projection::All => (0..schema.column_count()).collect(),
            Projection::Columns(names) => names
                .iter()
                .map(|name| {
                    schema.column_index(name).ok_or_else(|| {
                        eyre::eyre!("table '{}' has no column '{name}'", stmt.table)
                    })
                })
                .collect::<Result<_>>()?,
        };
        let column_names = projection
            .iter()
            .map(|&i| schema.columns()[i].name().to_string())
            .collect();

        let mut rows = Vec::new();
        for entry in heap.iter() {
            let (_, bytes) = entry?;
            let values = schema.deserialize(&bytes)?;
            if row_matches(stmt.filter.as_ref(), schema, &values)? {
                rows.push(projection.iter().map(|&i| values[i].clone()).collect());
            }
        }

        let rows_affected = rows.len();
        Ok(ExecutionResult {
            column_names,
            rows,
            rows_affected,
        })
    }

    fn execute_delete(&mut self, stmt: DeleteStmt) -> Result<ExecutionResult> {
        let (heap, schema) = self.resolve(&stmt.table)?;

        let mut doomed: Vec<RecordId> = Vec::new();
        for entry in heap.iter() {
            let (rid, bytes) = entry?;
            let values = schema.deserialize(&bytes)?;
            if row_matches(stmt.filter.as_ref(), schema, &values)? {
                doomed.push(rid);
            }
        }

        let mut deleted = 0;
        for rid in doomed {
            if heap.delete(rid)? {
                deleted += 1;
            }
        }

        Ok(ExecutionResult::affected(deleted))
    }

    fn execute_update(&mut self, stmt: UpdateStmt) -> Result<ExecutionResult> {
        let (heap, schema) = self.resolve(&stmt.table)?;

        let assignments: Vec<(usize, &Expr)> = stmt
            .assignments
            .iter()
            .map(|(name, expr)| {
                let index = schema.column_index(name).ok_or_else(|| {
                    eyre::eyre!("table '{}' has no column '{name}'", stmt.table)
                })?;
                Ok((index, expr))
            })
            .collect::<Result<_>>()?;

        let mut matches: Vec<(RecordId, Vec<Value>)> = Vec::new();
        for entry in heap.iter() {
            let (rid, bytes) = entry?;
            let values = schema.deserialize(&bytes)?;
            if row_matches(stmt.filter.as_ref(), schema, &values)? {
                matches.push((rid, values));
            }
        }

        let mut updated = 0;
        for (rid, mut values) in matches {
            // Assignment right-hand sides see the pre-update row.
            let old = values.clone();
            for (index, expr) in &assignments {
                values[*index] = evaluate(expr, Some(schema), Some(&old))?;
            }
            check_row(schema, &values)?;
            let bytes = schema.serialize(&values)?;
            if heap.update(rid, &bytes)?.is_some() {
                updated += 1;
            }
        }

        Ok(ExecutionResult::affected(updated))
    }
}

/// Schema-level row validation: NOT NULL and VARCHAR length limits.
fn check_row(schema: &Schema, values: &[Value]) -> Result<()> {
    for (column, value) in schema.columns().iter().zip(values) {
        if value.is_null() {
            ensure!(
                column.is_nullable(),
                "column '{}' is NOT NULL",
                column.name()
            );
            continue;
        }
        if let Value::Varchar(s) = value {
            ensure!(
                s.len() <= column.max_length() as usize,
                "value of {} bytes exceeds VARCHAR({}) for column '{}'",
                s.len(),
                column.max_length(),
                column.name()
            );
        }
    }
    Ok(())
}

fn row_matches(filter: Option<&Expr>, schema: &Schema, values: &[Value]) -> Result<bool> {
    let Some(expr) = filter else {
        return Ok(true);
    };
    let result = evaluate(expr, Some(schema), Some(values))?;
    Ok(matches!(result, Value::Integer(v) if v != 0))
}

fn truthy(value: &Value) -> bool {
    matches!(value, Value::Integer(v) if *v != 0)
}

/// Evaluates an expression, optionally against a row. Column references
/// without a row context (e.g. inside INSERT values) are errors.
fn evaluate(expr: &Expr, schema: Option<&Schema>, row: Option<&[Value]>) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Column(name) => {
            let (Some(schema), Some(row)) = (schema, row) else {
                bail!("column '{name}' is not allowed here");
            };
            let index = schema
                .column_index(name)
                .ok_or_else(|| eyre::eyre!("unknown column '{name}'"))?;
            Ok(row[index].clone())
        }
        Expr::Not(inner) => match evaluate(inner, schema, row)? {
            Value::Integer(v) => Ok(Value::Integer((v == 0) as i32)),
            _ => Ok(Value::Null),
        },
        Expr::Binary { op, left, right } => {
            let lhs = evaluate(left, schema, row)?;
            let rhs = evaluate(right, schema, row)?;
            match op {
                BinaryOp::And => Ok(Value::Integer((truthy(&lhs) && truthy(&rhs)) as i32)),
                BinaryOp::Or => Ok(Value::Integer((truthy(&lhs) || truthy(&rhs)) as i32)),
                BinaryOp::Eq | BinaryOp::NotEq | BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt
                | BinaryOp::GtEq => Ok(compare(*op, &lhs, &rhs)),
            }
        }
    }
}

/// Typed comparison. Null operands and mixed types yield `Null`, which the
/// filter boundary collapses to false.
fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Value {
    let ordering = match (lhs, rhs) {
        (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
        (Value::Varchar(a), Value::Varchar(b)) => a.cmp(b),
        _ => return Value::Null,
    };

    let result = match op {
        BinaryOp::Eq => ordering.is_eq(),
        BinaryOp::NotEq => ordering.is_ne(),
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::LtEq => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::GtEq => ordering.is_ge(),
        BinaryOp::And | BinaryOp::Or => unreachable!("logical ops handled by evaluate"),
    };

    Value::Integer(result as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::config::DEFAULT_BUFFER_POOL_SIZE;
    use crate::sql::parse_statement;
    use crate::storage::{DiskManager, FreeSpaceManager};
    use std::sync::Arc;

    struct Fixture {
        _dir: tempfile::TempDir,
        catalog: Catalog,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let disk = Arc::new(DiskManager::open(dir.path().join("t.db")).unwrap());
            let pool = Arc::new(BufferPool::new(DEFAULT_BUFFER_POOL_SIZE, disk));
            let fsm = Arc::new(FreeSpaceManager::new(Arc::clone(&pool)));
            fsm.initialize().unwrap();
            let catalog = Catalog::open(pool, fsm).unwrap();
            Self { _dir: dir, catalog }
        }

        fn run(&mut self, sql: &str) -> Result<ExecutionResult> {
            let stmt = parse_statement(sql)?;
            ExecutionEngine::new(&mut self.catalog).execute(stmt)
        }

        fn with_users() -> Self {
            let mut fx = Self::new();
            fx.run("CREATE TABLE users (id INTEGER, name VARCHAR(50), age INTEGER NOT NULL)")
                .unwrap();
            fx.run("INSERT INTO users VALUES (1, 'Alice', 25)").unwrap();
            fx.run("INSERT INTO users VALUES (2, 'Bob', 30)").unwrap();
            fx.run("INSERT INTO users VALUES (3, 'Carol', 35)").unwrap();
            fx
        }
    }

    #[test]
    fn select_star_returns_all_rows_and_headers() {
        let mut fx = Fixture::with_users();

        let result = fx.run("SELECT * FROM users").unwrap();

        assert_eq!(result.column_names, ["id", "name", "age"]);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(
            result.rows[1],
            vec![
                Value::Integer(2),
                Value::Varchar("Bob".into()),
                Value::Integer(30)
            ]
        );
    }

    #[test]
    fn where_filters_rows() {
        let mut fx = Fixture::with_users();

        let result = fx.run("SELECT * FROM users WHERE id = 2").unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][1], Value::Varchar("Bob".into()));
    }

    #[test]
    fn projection_reorders_columns() {
        let mut fx = Fixture::with_users();

        let result = fx.run("SELECT age, name FROM users WHERE id = 1").unwrap();

        assert_eq!(result.column_names, ["age", "name"]);
        assert_eq!(
            result.rows[0],
            vec![Value::Integer(25), Value::Varchar("Alice".into())]
        );
    }

    #[test]
    fn compound_predicates() {
        let mut fx = Fixture::with_users();

        let result = fx
            .run("SELECT * FROM users WHERE age > 25 AND age < 35")
            .unwrap();
        assert_eq!(result.rows.len(), 1);

        let result = fx
            .run("SELECT * FROM users WHERE id = 1 OR name = 'Carol'")
            .unwrap();
        assert_eq!(result.rows.len(), 2);

        let result = fx.run("SELECT * FROM users WHERE NOT age = 25").unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn varchar_comparisons_are_lexicographic() {
        let mut fx = Fixture::with_users();

        let result = fx.run("SELECT * FROM users WHERE name < 'Bob'").unwrap();

        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], Value::Integer(1));
    }

    #[test]
    fn null_predicate_excludes_the_row() {
        let mut fx = Fixture::with_users();
        fx.run("INSERT INTO users (id, age) VALUES (4, 40)").unwrap();

        // name is null for id 4: comparisons with null are null → excluded.
        let result = fx.run("SELECT * FROM users WHERE name = 'Alice'").unwrap();
        assert_eq!(result.rows.len(), 1);
        let result = fx.run("SELECT * FROM users WHERE name != 'Alice'").unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[test]
    fn insert_with_column_list_defaults_to_null() {
        let mut fx = Fixture::with_users();

        fx.run("INSERT INTO users (age, id) VALUES (99, 7)").unwrap();

        let result = fx.run("SELECT name, age FROM users WHERE id = 7").unwrap();
        assert_eq!(result.rows[0], vec![Value::Null, Value::Integer(99)]);
    }

    #[test]
    fn insert_enforces_not_null() {
        let mut fx = Fixture::with_users();

        let err = fx
            .run("INSERT INTO users (id, name) VALUES (8, 'NoAge')")
            .unwrap_err();

        assert!(err.to_string().contains("NOT NULL"));
    }

    #[test]
    fn insert_enforces_varchar_length() {
        let mut fx = Fixture::new();
        fx.run("CREATE TABLE t (s VARCHAR(3))").unwrap();

        assert!(fx.run("INSERT INTO t VALUES ('abc')").is_ok());
        let err = fx.run("INSERT INTO t VALUES ('abcd')").unwrap_err();
        assert!(err.to_string().contains("VARCHAR(3)"));
    }

    #[test]
    fn insert_enforces_types_and_arity() {
        let mut fx = Fixture::with_users();

        assert!(fx.run("INSERT INTO users VALUES (1, 2, 3)").is_err());
        assert!(fx.run("INSERT INTO users VALUES (1, 'x')").is_err());
        assert!(fx
            .run("INSERT INTO users (id, nope) VALUES (1, 2)")
            .is_err());
    }

    #[test]
    fn delete_with_predicate() {
        let mut fx = Fixture::with_users();

        let result = fx.run("DELETE FROM users WHERE age >= 30").unwrap();
        assert_eq!(result.rows_affected, 2);

        let remaining = fx.run("SELECT * FROM users").unwrap();
        assert_eq!(remaining.rows.len(), 1);
        assert_eq!(remaining.rows[0][0], Value::Integer(1));
    }

    #[test]
    fn delete_without_predicate_empties_the_table() {
        let mut fx = Fixture::with_users();

        let result = fx.run("DELETE FROM users").unwrap();
        assert_eq!(result.rows_affected, 3);
        assert_eq!(fx.run("SELECT * FROM users").unwrap().rows.len(), 0);
    }

    #[test]
    fn update_rewrites_matching_rows() {
        let mut fx = Fixture::with_users();

        let result = fx
            .run("UPDATE users SET name = 'Robert', age = 31 WHERE id = 2")
            .unwrap();
        assert_eq!(result.rows_affected, 1);

        let row = fx.run("SELECT * FROM users WHERE id = 2").unwrap();
        assert_eq!(
            row.rows[0],
            vec![
                Value::Integer(2),
                Value::Varchar("Robert".into()),
                Value::Integer(31)
            ]
        );
    }

    #[test]
    fn update_rhs_sees_the_old_row() {
        let mut fx = Fixture::with_users();

        // Swap-like assignment: id takes age's old value, age keeps its own.
        fx.run("UPDATE users SET id = age, age = age WHERE id = 1")
            .unwrap();

        let result = fx.run("SELECT * FROM users WHERE id = 25").unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][2], Value::Integer(25));
    }

    #[test]
    fn update_enforces_not_null() {
        let mut fx = Fixture::with_users();

        let err = fx.run("UPDATE users SET age = NULL WHERE id = 1").unwrap_err();
        assert!(err.to_string().contains("NOT NULL"));
    }

    #[test]
    fn unknown_table_and_column_are_errors() {
        let mut fx = Fixture::with_users();

        assert!(fx.run("SELECT * FROM missing").is_err());
        assert!(fx.run("SELECT nope FROM users").is_err());
        assert!(fx.run("DELETE FROM users WHERE nope = 1").is_err());
        assert!(fx.run("UPDATE users SET nope = 1").is_err());
    }

    #[test]
    fn create_table_rejects_duplicates() {
        let mut fx = Fixture::with_users();

        let err = fx.run("CREATE TABLE users (id INTEGER)").unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn column_refs_in_insert_values_are_rejected() {
        let mut fx = Fixture::with_users();

        let err = fx.run("INSERT INTO users VALUES (id, 'x', 1)").unwrap_err();
        assert!(err.to_string().contains("not allowed here"));
    }
}
