//! Collaborator traits
//!
//! The pipeline talks to the outside world through two seams: a directory
//! client it reads from and a record store it writes establishments into.
//! Both are injected so tests can substitute in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entry::{DirectoryEntry, PageRequest, SearchPage};
use crate::error::{DirectoryResult, StoreResult};

/// Connection parameters handed to [`DirectoryClient::connect`].
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryConnection {
    /// Directory server hostname or IP address.
    pub host: String,
    /// Directory server port.
    pub port: u16,
    /// URL scheme prefix, e.g. `ldaps://`.
    pub protocol: String,
    /// Bind DN or user principal.
    pub bind_user: String,
    /// Bind password.
    #[serde(skip_serializing)]
    pub bind_password: String,
}

impl DirectoryConnection {
    /// Build the server URL (`protocol` + `host` + `:` + `port`).
    #[must_use]
    pub fn url(&self) -> String {
        let protocol = if self.protocol.is_empty() {
            "ldap://"
        } else {
            self.protocol.as_str()
        };
        if protocol.ends_with("://") {
            format!("{}{}:{}", protocol, self.host, self.port)
        } else {
            format!("{}://{}:{}", protocol, self.host, self.port)
        }
    }
}

impl std::fmt::Debug for DirectoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("protocol", &self.protocol)
            .field("bind_user", &self.bind_user)
            .field("bind_password", &"***REDACTED***")
            .finish()
    }
}

/// Read-only directory access used by an import session.
///
/// One client holds at most one connection. Calls are strictly sequential.
#[async_trait]
pub trait DirectoryClient: Send {
    /// Open a connection to the directory server.
    async fn connect(&mut self, connection: &DirectoryConnection) -> DirectoryResult<()>;

    /// Authenticate the open connection.
    async fn bind(&mut self, user: &str, password: &str) -> DirectoryResult<()>;

    /// Fetch one page of a paginated subtree search.
    ///
    /// `cookie` is the continuation returned by the previous page, or `None`
    /// for the first request.
    async fn search_page(
        &mut self,
        request: &PageRequest,
        cookie: Option<&[u8]>,
    ) -> DirectoryResult<SearchPage>;

    /// Read a single entry by DN (base-scope search, all attributes).
    ///
    /// Returns `Ok(None)` if the object does not exist.
    async fn read_entry(&mut self, dn: &str) -> DirectoryResult<Option<DirectoryEntry>>;

    /// Unbind and release the connection.
    async fn close(&mut self) -> DirectoryResult<()>;
}

/// A stored row: column name to value.
pub type Row = BTreeMap<String, String>;

/// Conjunction of column equality tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    terms: Vec<(String, String)>,
}

impl Predicate {
    /// Predicate matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Predicate `column = value`.
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            terms: vec![(column.into(), value.into())],
        }
    }

    /// Add `AND column = value`.
    #[must_use]
    pub fn and(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.push((column.into(), value.into()));
        self
    }

    /// The `(column, value)` terms in order.
    pub fn terms(&self) -> &[(String, String)] {
        &self.terms
    }

    /// Check whether a row satisfies every term.
    pub fn matches(&self, row: &Row) -> bool {
        self.terms
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }
}

/// Table definition for idempotent schema setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    /// Unprefixed table name.
    pub name: String,
    /// Text columns besides the surrogate `id`.
    pub columns: Vec<String>,
}

impl TableSpec {
    /// Create a table spec.
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

/// Transactional storage surface used by the establishment registry.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create the table if it does not exist yet.
    async fn ensure_table(&self, table: &TableSpec) -> StoreResult<()>;

    /// Add a text column to an existing table.
    ///
    /// Returns [`StoreError::SchemaConflict`](crate::error::StoreError::SchemaConflict)
    /// if the column already exists.
    async fn add_column(&self, table: &str, column: &str) -> StoreResult<()>;

    /// Check whether any row matches.
    async fn exists(&self, table: &str, predicate: &Predicate) -> StoreResult<bool>;

    /// Return the rows that match.
    async fn select(&self, table: &str, predicate: &Predicate) -> StoreResult<Vec<Row>>;

    /// Insert one row.
    async fn insert(&self, table: &str, fields: &Row) -> StoreResult<()>;

    /// Insert `fields` only if no row matches `key`.
    ///
    /// Returns `true` when a row was written. The default is a check then an
    /// insert; stores with a native conflict-ignoring insert override it.
    async fn insert_if_absent(
        &self,
        table: &str,
        key: &Predicate,
        fields: &Row,
    ) -> StoreResult<bool> {
        if self.exists(table, key).await? {
            return Ok(false);
        }
        self.insert(table, fields).await?;
        Ok(true)
    }
}
