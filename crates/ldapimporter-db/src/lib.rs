//! # PostgreSQL Record Store
//!
//! `sqlx`-backed [`RecordStore`](ldapimporter_core::RecordStore) holding the
//! establishment registry tables of the directory user import pipeline.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ldapimporter_db::PgRecordStore;
//!
//! let store = PgRecordStore::connect("postgres://localhost/identity", 5)
//!     .await?
//!     .with_table_prefix("oc_");
//! let session = ImportSession::new(config, client, Arc::new(store));
//! ```

pub mod error;
pub mod store;

pub use error::DbError;
pub use store::PgRecordStore;
