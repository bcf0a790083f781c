//! PostgreSQL record store.
//!
//! Tables are addressed by name at runtime, so statements are built with
//! validated, quoted identifiers and every value goes through a bind
//! parameter.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{debug, info, instrument};

use ldapimporter_core::error::StoreResult;
use ldapimporter_core::traits::{Predicate, RecordStore, Row, TableSpec};

use crate::error::{store_error, DbError};

/// PostgreSQL's identifier length limit.
const MAX_IDENTIFIER_LEN: usize = 63;

/// [`RecordStore`] over a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    table_prefix: String,
}

impl PgRecordStore {
    /// Connect a new pool.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        debug!(max_connections, "Creating database connection pool");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        info!("Database connection pool established");
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            table_prefix: String::new(),
        }
    }

    /// Prefix every table name, e.g. `oc_`.
    pub fn with_table_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.table_prefix = prefix.into();
        self
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Quoted, prefixed table name.
    fn table(&self, table: &str) -> Result<String, DbError> {
        quote_identifier(&format!("{}{}", self.table_prefix, table))
    }
}

/// Validate and double-quote an identifier.
///
/// Only ASCII letters, digits and `_` are accepted, not starting with a digit.
pub fn quote_identifier(identifier: &str) -> Result<String, DbError> {
    let valid = !identifier.is_empty()
        && identifier.len() <= MAX_IDENTIFIER_LEN
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !identifier.starts_with(|c: char| c.is_ascii_digit());
    if !valid {
        return Err(DbError::InvalidIdentifier(identifier.to_string()));
    }
    Ok(format!("\"{identifier}\""))
}

/// Build a `WHERE` clause whose placeholders start after `offset`.
///
/// Returns an empty clause for a predicate with no terms.
fn where_clause(predicate: &Predicate, offset: usize) -> Result<(String, Vec<String>), DbError> {
    let mut conditions = Vec::new();
    let mut values = Vec::new();
    for (i, (column, value)) in predicate.terms().iter().enumerate() {
        conditions.push(format!("{} = ${}", quote_identifier(column)?, offset + i + 1));
        values.push(value.clone());
    }
    if conditions.is_empty() {
        return Ok((String::new(), values));
    }
    Ok((format!(" WHERE {}", conditions.join(" AND ")), values))
}

/// Quoted column list and matching placeholders for an insert.
fn insert_columns(fields: &Row) -> Result<(String, String, Vec<String>), DbError> {
    let mut columns = Vec::new();
    let mut placeholders = Vec::new();
    let mut values = Vec::new();
    for (i, (column, value)) in fields.iter().enumerate() {
        columns.push(quote_identifier(column)?);
        placeholders.push(format!("${}", i + 1));
        values.push(value.clone());
    }
    Ok((columns.join(", "), placeholders.join(", "), values))
}

/// Convert a `to_jsonb` row; nulls are dropped, non-text values stringified.
fn row_from_json(value: serde_json::Value) -> Row {
    let serde_json::Value::Object(map) = value else {
        return Row::new();
    };
    map.into_iter()
        .filter(|(column, _)| column != "id")
        .filter_map(|(column, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((column, s)),
            other => Some((column, other.to_string())),
        })
        .collect()
}

#[async_trait]
impl RecordStore for PgRecordStore {
    #[instrument(skip(self, table), fields(table = %table.name))]
    async fn ensure_table(&self, table: &TableSpec) -> StoreResult<()> {
        let name = self.table(&table.name)?;
        let mut columns = vec!["id BIGSERIAL PRIMARY KEY".to_string()];
        for column in &table.columns {
            columns.push(format!("{} TEXT", quote_identifier(column)?));
        }
        let statement = format!("CREATE TABLE IF NOT EXISTS {} ({})", name, columns.join(", "));

        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error(e, &table.name))?;
        debug!(table = %table.name, "Table ready");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_column(&self, table: &str, column: &str) -> StoreResult<()> {
        let statement = format!(
            "ALTER TABLE {} ADD COLUMN {} TEXT",
            self.table(table)?,
            quote_identifier(column)?
        );

        sqlx::query(&statement)
            .execute(&self.pool)
            .await
            .map_err(|e| store_error(e, &format!("{table}.{column}")))?;
        info!(table = %table, column = %column, "Column added");
        Ok(())
    }

    async fn exists(&self, table: &str, predicate: &Predicate) -> StoreResult<bool> {
        let (filter, values) = where_clause(predicate, 0)?;
        let statement = format!(
            "SELECT EXISTS (SELECT 1 FROM {}{})",
            self.table(table)?,
            filter
        );

        let mut query = sqlx::query_scalar::<_, bool>(&statement);
        for value in &values {
            query = query.bind(value);
        }
        let found = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| store_error(e, table))?;
        Ok(found)
    }

    async fn select(&self, table: &str, predicate: &Predicate) -> StoreResult<Vec<Row>> {
        let (filter, values) = where_clause(predicate, 0)?;
        let statement = format!(
            "SELECT to_jsonb(t) FROM {} AS t{} ORDER BY t.id",
            self.table(table)?,
            filter
        );

        let mut query = sqlx::query_scalar::<_, serde_json::Value>(&statement);
        for value in &values {
            query = query.bind(value);
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| store_error(e, table))?;
        Ok(rows.into_iter().map(row_from_json).collect())
    }

    async fn insert(&self, table: &str, fields: &Row) -> StoreResult<()> {
        let (columns, placeholders, values) = insert_columns(fields)?;
        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table(table)?,
            columns,
            placeholders
        );

        let mut query = sqlx::query(&statement);
        for value in &values {
            query = query.bind(value);
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|e| store_error(e, table))?;
        Ok(())
    }

    /// Single `INSERT .. SELECT .. WHERE NOT EXISTS` statement.
    async fn insert_if_absent(
        &self,
        table: &str,
        key: &Predicate,
        fields: &Row,
    ) -> StoreResult<bool> {
        let name = self.table(table)?;
        let (columns, placeholders, mut values) = insert_columns(fields)?;
        let (filter, key_values) = where_clause(key, values.len())?;
        values.extend(key_values);

        let statement = format!(
            "INSERT INTO {name} ({columns}) SELECT {placeholders} \
             WHERE NOT EXISTS (SELECT 1 FROM {name}{filter})"
        );

        let mut query = sqlx::query(&statement);
        for value in &values {
            query = query.bind(value);
        }
        let result = query
            .execute(&self.pool)
            .await
            .map_err(|e| store_error(e, table))?;
        Ok(result.rows_affected() > 0)
    }
}
