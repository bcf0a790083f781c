//! Error types for the ldapimporter-db crate.
//!
//! Wraps `SQLx` errors and maps them onto the pipeline's
//! [`StoreError`](ldapimporter_core::StoreError).

use ldapimporter_core::error::StoreError;
use thiserror::Error;

/// PostgreSQL error code for a column that already exists.
pub const DUPLICATE_COLUMN: &str = "42701";

/// PostgreSQL error code for a table that already exists.
pub const DUPLICATE_TABLE: &str = "42P07";

/// PostgreSQL error code for a missing table.
pub const UNDEFINED_TABLE: &str = "42P01";

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    /// A table or column name is not a plain SQL identifier.
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl DbError {
    /// Check if this error indicates a connection problem.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, DbError::ConnectionFailed(_))
    }

    /// The PostgreSQL SQLSTATE code, if the server reported one.
    #[must_use]
    pub fn code(&self) -> Option<String> {
        match self {
            DbError::ConnectionFailed(e) | DbError::QueryFailed(e) => sqlstate(e),
            DbError::InvalidIdentifier(_) => None,
        }
    }
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Map a failed statement on `object` to a store error.
pub(crate) fn store_error(err: sqlx::Error, object: &str) -> StoreError {
    match sqlstate(&err).as_deref() {
        Some(DUPLICATE_COLUMN | DUPLICATE_TABLE) => StoreError::SchemaConflict {
            object: object.to_string(),
        },
        Some(UNDEFINED_TABLE) => StoreError::TableNotFound {
            table: object.split('.').next().unwrap_or(object).to_string(),
        },
        _ => DbError::QueryFailed(err).into(),
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionFailed(e) => StoreError::Unavailable {
                message: e.to_string(),
            },
            DbError::QueryFailed(e) => StoreError::query_with_source("database query failed", e),
            DbError::InvalidIdentifier(identifier) => StoreError::InvalidIdentifier { identifier },
        }
    }
}
