//! # Directory User Import
//!
//! Imports users and groups from an LDAP or Active Directory server into a
//! local identity store.
//!
//! ## Pipeline
//!
//! Each import run pushes every directory entry through the same stages, in
//! page order:
//!
//! - [`DirectoryPageReader`] - paged search with continuation cookies
//! - [`project`] - raw entry to candidate [`UserRecord`]
//! - [`GroupNameSynthesizer`] - functional and pedagogic group naming rules
//! - [`EstablishmentRegistry`] - deduplicated org codes and associations
//! - [`merge_users`] - folds duplicate accounts into one record
//!
//! [`ImportSession`] drives the stages against a [`DirectoryClient`] and a
//! [`RecordStore`], both injected.
//!
//! ## Example
//!
//! ```ignore
//! use ldapimporter_core::prelude::*;
//!
//! let config = ImportConfig::from_source(&source);
//! let mut session = ImportSession::new(config, client, store);
//! let report = session.execute().await?;
//!
//! CsvExporter::new().export(&report.users, &mut std::io::stdout())?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`config`] - settings read from a host [`ConfigSource`]
//! - [`entry`] - raw directory entries and paging types
//! - [`error`] - error types per collaborator
//! - [`traits`] - directory client and record store seams
//! - [`template`] - `${...}` naming template interpreter
//! - [`store`] - in-memory record store

pub mod config;
pub mod entry;
pub mod error;
pub mod export;
pub mod groups;
pub mod merge;
pub mod model;
pub mod pager;
pub mod projector;
pub mod registry;
pub mod session;
pub mod store;
pub mod template;
pub mod traits;

pub use config::{ConfigSource, HashMapConfigSource, ImportConfig};
pub use entry::{DirectoryEntry, DirectoryPage, PageRequest, SearchPage};
pub use error::{DirectoryError, ImportError, ImportResult, StoreError};
pub use export::{CsvExporter, Exporter, TextExporter};
pub use groups::GroupNameSynthesizer;
pub use merge::{merge_users, MergePolicy};
pub use model::{UserMap, UserRecord};
pub use pager::DirectoryPageReader;
pub use projector::project;
pub use registry::EstablishmentRegistry;
pub use session::{ImportReport, ImportSession};
pub use store::InMemoryRecordStore;
pub use traits::{DirectoryClient, RecordStore};

/// Prelude module for convenient imports.
///
/// ```
/// use ldapimporter_core::prelude::*;
/// ```
pub mod prelude {
    // Configuration
    pub use crate::config::{
        AttributeMapping, ConfigSource, EnabledPolicy, HashMapConfigSource, ImportConfig,
    };

    // Entries and paging
    pub use crate::entry::{DirectoryEntry, DirectoryPage, PageRequest, SearchPage};

    // Error handling
    pub use crate::error::{
        DirectoryError, DirectoryResult, ImportError, ImportResult, StoreError, StoreResult,
    };

    // Traits
    pub use crate::traits::{
        DirectoryClient, DirectoryConnection, Predicate, RecordStore, Row, TableSpec,
    };

    // Pipeline
    pub use crate::groups::{FunctionalRule, GroupNameSynthesizer, OrgCodeExtractor, PedagogicRule};
    pub use crate::merge::{merge_users, MergeOutcome, MergePolicy};
    pub use crate::model::{Association, EstablishmentRecord, UserMap, UserRecord};
    pub use crate::pager::{fetch_pages, DirectoryPageReader};
    pub use crate::projector::{project, ProjectionResult};
    pub use crate::registry::EstablishmentRegistry;
    pub use crate::session::{ImportReport, ImportSession, ImportStatistics};

    // Export
    pub use crate::export::{CsvExporter, Exporter, TextExporter};

    // Stores
    pub use crate::store::InMemoryRecordStore;
}
