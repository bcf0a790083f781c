//! In-memory record store.
//!
//! Backs unit and integration tests, and dry runs where nothing should be
//! persisted.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{Predicate, RecordStore, Row, TableSpec};

#[derive(Debug, Default)]
struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

/// [`RecordStore`] kept entirely in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a table (0 if it does not exist).
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    /// Columns of a table, if it exists.
    pub async fn columns(&self, table: &str) -> Option<Vec<String>> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.columns.clone())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn ensure_table(&self, table: &TableSpec) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        tables.entry(table.name.clone()).or_insert_with(|| Table {
            columns: table.columns.clone(),
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn add_column(&self, table: &str, column: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(table.to_string()).or_default();
        if entry.columns.iter().any(|c| c == column) {
            return Err(StoreError::SchemaConflict {
                object: format!("{table}.{column}"),
            });
        }
        entry.columns.push(column.to_string());
        Ok(())
    }

    async fn exists(&self, table: &str, predicate: &Predicate) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        let table = tables.get(table).ok_or_else(|| StoreError::TableNotFound {
            table: table.to_string(),
        })?;
        Ok(table.rows.iter().any(|row| predicate.matches(row)))
    }

    async fn select(&self, table: &str, predicate: &Predicate) -> StoreResult<Vec<Row>> {
        let tables = self.tables.read().await;
        let table = tables.get(table).ok_or_else(|| StoreError::TableNotFound {
            table: table.to_string(),
        })?;
        Ok(table
            .rows
            .iter()
            .filter(|row| predicate.matches(row))
            .cloned()
            .collect())
    }

    async fn insert(&self, table: &str, fields: &Row) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound {
                table: table.to_string(),
            })?;
        table.rows.push(fields.clone());
        Ok(())
    }

    // Check and insert under one write lock.
    async fn insert_if_absent(
        &self,
        table: &str,
        key: &Predicate,
        fields: &Row,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound {
                table: table.to_string(),
            })?;
        if table.rows.iter().any(|row| key.matches(row)) {
            return Ok(false);
        }
        table.rows.push(fields.clone());
        Ok(true)
    }
}
