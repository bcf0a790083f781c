//! Import pipeline error types
//!
//! Error definitions split by collaborator: the directory client, the record
//! store, and the session that drives both. Only session-level errors leave
//! the pipeline; per-entry and per-rule anomalies are logged where they occur.

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by a [`DirectoryClient`](crate::traits::DirectoryClient).
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Failed to open a connection to the directory server.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Invalid bind credentials (LDAP result code 49).
    #[error("authentication failed: invalid credentials")]
    AuthenticationFailed,

    /// Bind was rejected for a reason other than credentials.
    #[error("bind failed: {message}")]
    BindFailed { message: String },

    /// A search request failed.
    #[error("search failed: {message}")]
    SearchFailed {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The requested base object does not exist (LDAP result code 32).
    #[error("no such object: {dn}")]
    NoSuchObject { dn: String },

    /// An operation was attempted before `connect` succeeded.
    #[error("not connected")]
    NotConnected,
}

impl DirectoryError {
    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failed error with source.
    pub fn connection_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search failed error.
    pub fn search_failed(message: impl Into<String>) -> Self {
        DirectoryError::SearchFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a search failed error with source.
    pub fn search_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::SearchFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for directory client operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Error returned by a [`RecordStore`](crate::traits::RecordStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Schema setup hit an object that already exists (table, column).
    ///
    /// Expected on reruns; callers log it and carry on.
    #[error("schema object already exists: {object}")]
    SchemaConflict { object: String },

    /// The table does not exist.
    #[error("table not found: {table}")]
    TableNotFound { table: String },

    /// A table or column name was rejected before reaching the store.
    #[error("invalid identifier: {identifier}")]
    InvalidIdentifier { identifier: String },

    /// A query failed.
    #[error("query failed: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// The store could not be reached.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Create a query error with source.
    pub fn query_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        StoreError::Query {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Check if this error is an expected rerun conflict.
    pub fn is_schema_conflict(&self) -> bool {
        matches!(self, StoreError::SchemaConflict { .. })
    }
}

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Fatal error for an import session.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Could not connect to the directory.
    #[error("import aborted at connect: {0}")]
    Connect(#[source] DirectoryError),

    /// Could not bind to the directory.
    #[error("import aborted at bind: {0}")]
    Bind(#[source] DirectoryError),

    /// A page request failed mid-pagination.
    #[error("import aborted at search: {0}")]
    Search(#[source] DirectoryError),

    /// The record store failed during schema setup.
    #[error("import aborted at store setup: {0}")]
    Store(#[source] StoreError),

    /// The configuration cannot drive a session.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Writing the exported mapping failed.
    #[error("export failed: {message}")]
    Export {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl ImportError {
    /// The pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            ImportError::Connect(_) => "connect",
            ImportError::Bind(_) => "bind",
            ImportError::Search(_) => "search",
            ImportError::Store(_) => "store",
            ImportError::Config { .. } => "config",
            ImportError::Export { .. } => "export",
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        ImportError::Config {
            message: message.into(),
        }
    }

    /// Create an export error with source.
    pub fn export_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ImportError::Export {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for import sessions.
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_stage() {
        assert_eq!(
            ImportError::Connect(DirectoryError::connection_failed("x")).stage(),
            "connect"
        );
        assert_eq!(
            ImportError::Bind(DirectoryError::AuthenticationFailed).stage(),
            "bind"
        );
        assert_eq!(
            ImportError::Search(DirectoryError::search_failed("x")).stage(),
            "search"
        );
        assert_eq!(ImportError::config("bad").stage(), "config");
    }

    #[test]
    fn test_error_display() {
        let err = ImportError::Bind(DirectoryError::AuthenticationFailed);
        assert_eq!(
            err.to_string(),
            "import aborted at bind: authentication failed: invalid credentials"
        );

        let err = StoreError::SchemaConflict {
            object: "users.uai_courant".to_string(),
        };
        assert!(err.is_schema_conflict());
        assert_eq!(
            err.to_string(),
            "schema object already exists: users.uai_courant"
        );
    }

    #[test]
    fn test_error_with_source() {
        let source_err = std::io::Error::new(std::io::ErrorKind::Other, "reset by peer");
        let err = DirectoryError::search_failed_with_source("page 3", source_err);

        if let DirectoryError::SearchFailed { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("Expected SearchFailed variant");
        }
    }
}
