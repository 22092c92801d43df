//! Statement sinks for child-table reconciliation plans.
//!
//! Two interchangeable executors exist: one renders parameterised SQL text
//! per row action, the other issues typed diesel statements per table. Both
//! require every statement to touch exactly one row.

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;

use incid_sync_core::bap::BapRecord;
use incid_sync_core::conditions::{FilterCondition, SqlValue};
use incid_sync_core::errors::{Error, Result};
use incid_sync_core::reconcile::{
    apply_plan, AppliedCounts, ChildRow, ChildRowExecutor, MultiplexRow, ReconcilePlan, SourceRow,
};
use incid_sync_core::settings::BulkExecutionStrategy;

use crate::errors::StorageError;
use crate::ids::IdAllocator;
use crate::incid::{with_multiplex_table, BapDB, SourceDB};
use crate::schema::{incid_bap, incid_sources};
use crate::sql;

fn expect_one(table: &str, operation: &str, affected: usize) -> Result<()> {
    if affected == 1 {
        Ok(())
    } else {
        Err(Error::statement(
            table,
            operation,
            format!("expected 1 row affected, got {}", affected),
        ))
    }
}

/// Executes row actions as parameterised SQL built from the row's columns.
pub struct SqlStatementExecutor<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SqlStatementExecutor<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }
}

fn key_condition<R: ChildRow>(row: &R) -> Vec<FilterCondition> {
    vec![FilterCondition::eq(row.id_table().id_column(), row.row_id())]
}

impl<R: ChildRow> ChildRowExecutor<R> for SqlStatementExecutor<'_> {
    fn update(&mut self, row: &R) -> Result<()> {
        let table = row.id_table().table_name();
        let statement = sql::update_statement(table, &row.column_values(), &key_condition(row));
        let affected = sql::execute(self.conn, &statement)?;
        expect_one(table, "update", affected)
    }

    fn insert(&mut self, row: &R) -> Result<()> {
        let id_table = row.id_table();
        let mut values: Vec<(&str, SqlValue)> = vec![
            (id_table.id_column(), SqlValue::from(row.row_id())),
            ("incid", SqlValue::from(row.incid())),
        ];
        values.extend(row.column_values());
        let statement = sql::insert_statement(id_table.table_name(), &values);
        let affected = sql::execute(self.conn, &statement)?;
        expect_one(id_table.table_name(), "insert", affected)
    }

    fn delete(&mut self, row: &R) -> Result<()> {
        let table = row.id_table().table_name();
        let statement = sql::delete_statement(table, &key_condition(row));
        let affected = sql::execute(self.conn, &statement)?;
        expect_one(table, "delete", affected)
    }
}

/// Executes row actions as typed diesel statements against each table.
pub struct TableAdapterExecutor<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TableAdapterExecutor<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }
}

fn required_code<'r>(row: &'r MultiplexRow, operation: &str) -> Result<&'r str> {
    row.code
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            Error::statement(
                row.category.table_name(),
                operation,
                format!("row {} has no {} code", row.id, row.category),
            )
        })
}

impl ChildRowExecutor<MultiplexRow> for TableAdapterExecutor<'_> {
    fn update(&mut self, row: &MultiplexRow) -> Result<()> {
        let code = required_code(row, "update")?;
        let conn = &mut *self.conn;
        let affected = with_multiplex_table!(row.category, |table, id_col, _incid_col, code_col| {
            diesel::update(table.filter(id_col.eq(row.id)))
                .set(code_col.eq(code))
                .execute(conn)
                .map_err(StorageError::from)?
        });
        expect_one(row.category.table_name(), "update", affected)
    }

    fn insert(&mut self, row: &MultiplexRow) -> Result<()> {
        let code = required_code(row, "insert")?;
        let conn = &mut *self.conn;
        let affected = with_multiplex_table!(row.category, |table, id_col, incid_col, code_col| {
            diesel::insert_into(table)
                .values((
                    id_col.eq(row.id),
                    incid_col.eq(row.incid.as_str()),
                    code_col.eq(code),
                ))
                .execute(conn)
                .map_err(StorageError::from)?
        });
        expect_one(row.category.table_name(), "insert", affected)
    }

    fn delete(&mut self, row: &MultiplexRow) -> Result<()> {
        let conn = &mut *self.conn;
        let affected = with_multiplex_table!(row.category, |table, id_col, _incid_col, _code_col| {
            diesel::delete(table.filter(id_col.eq(row.id)))
                .execute(conn)
                .map_err(StorageError::from)?
        });
        expect_one(row.category.table_name(), "delete", affected)
    }
}

impl ChildRowExecutor<SourceRow> for TableAdapterExecutor<'_> {
    fn update(&mut self, row: &SourceRow) -> Result<()> {
        let affected = diesel::update(incid_sources::table.find(row.incid_source_id))
            .set(&SourceDB::from(row))
            .execute(&mut *self.conn)
            .map_err(StorageError::from)?;
        expect_one("incid_sources", "update", affected)
    }

    fn insert(&mut self, row: &SourceRow) -> Result<()> {
        let affected = diesel::insert_into(incid_sources::table)
            .values(&SourceDB::from(row))
            .execute(&mut *self.conn)
            .map_err(StorageError::from)?;
        expect_one("incid_sources", "insert", affected)
    }

    fn delete(&mut self, row: &SourceRow) -> Result<()> {
        let affected = diesel::delete(incid_sources::table.find(row.incid_source_id))
            .execute(&mut *self.conn)
            .map_err(StorageError::from)?;
        expect_one("incid_sources", "delete", affected)
    }
}

impl ChildRowExecutor<BapRecord> for TableAdapterExecutor<'_> {
    fn update(&mut self, row: &BapRecord) -> Result<()> {
        let affected = diesel::update(incid_bap::table.find(row.bap_id))
            .set(&BapDB::from(row))
            .execute(&mut *self.conn)
            .map_err(StorageError::from)?;
        expect_one("incid_bap", "update", affected)
    }

    fn insert(&mut self, row: &BapRecord) -> Result<()> {
        let affected = diesel::insert_into(incid_bap::table)
            .values(&BapDB::from(row))
            .execute(&mut *self.conn)
            .map_err(StorageError::from)?;
        expect_one("incid_bap", "insert", affected)
    }

    fn delete(&mut self, row: &BapRecord) -> Result<()> {
        let affected = diesel::delete(incid_bap::table.find(row.bap_id))
            .execute(&mut *self.conn)
            .map_err(StorageError::from)?;
        expect_one("incid_bap", "delete", affected)
    }
}

/// Applies `plan` with the executor chosen by `strategy`, allocating insert
/// keys from `ids`.
pub fn apply_child_plan<R>(
    conn: &mut SqliteConnection,
    strategy: BulkExecutionStrategy,
    ids: &mut IdAllocator,
    plan: ReconcilePlan<R>,
) -> Result<AppliedCounts>
where
    R: ChildRow,
    for<'c> TableAdapterExecutor<'c>: ChildRowExecutor<R>,
{
    if plan.is_empty() {
        return Ok(AppliedCounts::default());
    }
    if let Some(first) = plan.inserts.first() {
        ids.seed(conn, first.id_table())?;
    }
    debug!(
        "Applying {} update(s), {} insert(s), {} delete(s) via {:?}",
        plan.updates.len(),
        plan.inserts.len(),
        plan.deletes.len(),
        strategy
    );
    match strategy {
        BulkExecutionStrategy::InlineSql => {
            apply_plan(plan, &mut SqlStatementExecutor::new(conn), |t| ids.allocate(t))
        }
        BulkExecutionStrategy::TableAdapter => {
            apply_plan(plan, &mut TableAdapterExecutor::new(conn), |t| ids.allocate(t))
        }
    }
}
