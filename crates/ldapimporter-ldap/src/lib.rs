//! # LDAP Directory Client
//!
//! `ldap3`-backed [`DirectoryClient`](ldapimporter_core::DirectoryClient) for
//! the directory user import pipeline.
//!
//! ## Features
//!
//! - LDAP and LDAPS, optional STARTTLS
//! - Simple bind with invalid-credential detection
//! - Paged subtree searches (simple paged results control)
//! - Base-scope entry reads for group lookups
//!
//! ## Example
//!
//! ```ignore
//! use ldapimporter_ldap::{LdapConfig, LdapDirectoryClient};
//!
//! let client = LdapDirectoryClient::new(
//!     LdapConfig::default().with_connection_timeout(5),
//! );
//! let mut session = ImportSession::new(config, client, store);
//! let report = session.execute().await?;
//! ```

pub mod client;
pub mod config;

pub use client::{paged_cookie, to_directory_entry, LdapDirectoryClient};
pub use config::LdapConfig;
