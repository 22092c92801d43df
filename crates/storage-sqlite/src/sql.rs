//! Parameterised execution of SQL rendered from filter conditions.

use diesel::prelude::*;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_types::{BigInt, Double, Nullable, Text};
use diesel::sqlite::{Sqlite, SqliteConnection};
use log::debug;

use incid_sync_core::conditions::{quote_identifier, render_where_clause, FilterCondition, RenderedSql, SqlValue};
use incid_sync_core::errors::Result;

use crate::errors::StorageError;

#[derive(QueryableByName)]
pub(crate) struct CountRow {
    #[diesel(sql_type = BigInt)]
    pub c: i64,
}

#[derive(QueryableByName)]
pub(crate) struct MaxRow {
    #[diesel(sql_type = Nullable<BigInt>)]
    pub m: Option<i64>,
}

fn bind_values<'a>(
    mut query: BoxedSqlQuery<'a, Sqlite, SqlQuery>,
    binds: &[SqlValue],
) -> BoxedSqlQuery<'a, Sqlite, SqlQuery> {
    for value in binds {
        query = match value {
            SqlValue::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            SqlValue::Integer(v) => query.bind::<BigInt, _>(*v),
            SqlValue::Real(v) => query.bind::<Double, _>(*v),
            SqlValue::Text(v) => query.bind::<Text, _>(v.clone()),
        };
    }
    query
}

fn prepare(statement: &RenderedSql) -> BoxedSqlQuery<'static, Sqlite, SqlQuery> {
    debug!("{} -- {} bind(s)", statement.sql, statement.binds.len());
    bind_values(diesel::sql_query(statement.sql.clone()).into_boxed(), &statement.binds)
}

/// Executes a statement and returns the number of affected rows.
pub fn execute(conn: &mut SqliteConnection, statement: &RenderedSql) -> Result<usize> {
    Ok(prepare(statement)
        .execute(conn)
        .map_err(StorageError::from)?)
}

pub fn load<T>(conn: &mut SqliteConnection, statement: &RenderedSql) -> Result<Vec<T>>
where
    T: QueryableByName<Sqlite> + 'static,
{
    Ok(prepare(statement)
        .load::<T>(conn)
        .map_err(StorageError::from)?)
}

pub fn count(conn: &mut SqliteConnection, statement: &RenderedSql) -> Result<i64> {
    Ok(load::<CountRow>(conn, statement)?
        .first()
        .map(|row| row.c)
        .unwrap_or(0))
}

/// `MAX(column)` over a table, or `None` for an empty table.
pub fn max_value(conn: &mut SqliteConnection, table: &str, column: &str) -> Result<Option<i64>> {
    let statement = RenderedSql::new(format!(
        "SELECT MAX({}) AS m FROM {}",
        quote_identifier(column),
        quote_identifier(table)
    ));
    Ok(load::<MaxRow>(conn, &statement)?
        .first()
        .and_then(|row| row.m))
}

/// `UPDATE table SET col = ?, ...` followed by the rendered conditions.
pub fn update_statement(
    table: &str,
    assignments: &[(&str, SqlValue)],
    conditions: &[FilterCondition],
) -> RenderedSql {
    let mut statement = RenderedSql::new(format!("UPDATE {} SET ", quote_identifier(table)));
    for (i, (column, value)) in assignments.iter().enumerate() {
        if i > 0 {
            statement.push_sql(", ");
        }
        statement.push_sql(&format!("{} = ?", quote_identifier(column)));
        statement.binds.push(value.clone());
    }
    statement.append(render_where_clause(conditions, true));
    statement
}

pub fn insert_statement(table: &str, values: &[(&str, SqlValue)]) -> RenderedSql {
    let columns = values
        .iter()
        .map(|(column, _)| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; values.len()].join(", ");
    let mut statement = RenderedSql::new(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        columns,
        placeholders
    ));
    statement
        .binds
        .extend(values.iter().map(|(_, value)| value.clone()));
    statement
}

pub fn delete_statement(table: &str, conditions: &[FilterCondition]) -> RenderedSql {
    let mut statement = RenderedSql::new(format!("DELETE FROM {}", quote_identifier(table)));
    statement.append(render_where_clause(conditions, true));
    statement
}
