//! Test helpers for ldapimporter-core integration tests.
//!
//! Provides a scripted directory client that serves canned pages and group
//! entries, and records every call made against it.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Once;

use ldapimporter_core::prelude::*;

static INIT: Once = Once::new();

/// Initialize logging for tests (once).
pub fn init_test_logging() {
    INIT.call_once(|| {
        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_test_writer()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init()
                .ok();
        }
    });
}

/// Call recorded by [`ScriptedDirectory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    Bind(String),
    Search(Option<Vec<u8>>),
    Read(String),
    Close,
}

/// Directory client driven by a script of page responses.
#[derive(Default)]
pub struct ScriptedDirectory {
    pages: VecDeque<DirectoryResult<SearchPage>>,
    groups: HashMap<String, DirectoryEntry>,
    pub fail_connect: bool,
    pub fail_bind: bool,
    pub calls: Vec<Call>,
    pub last_request: Option<PageRequest>,
}

impl ScriptedDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the connection.
    pub fn failing_connect() -> Self {
        Self {
            fail_connect: true,
            ..Self::default()
        }
    }

    /// Accept the connection but reject the bind credentials.
    pub fn failing_bind() -> Self {
        Self {
            fail_bind: true,
            ..Self::default()
        }
    }

    /// Serve `entries` as one page; every page but the last gets a cookie.
    pub fn with_pages(mut self, pages: Vec<Vec<DirectoryEntry>>) -> Self {
        let last = pages.len().saturating_sub(1);
        for (i, entries) in pages.into_iter().enumerate() {
            let page = if i == last {
                SearchPage::last(entries)
            } else {
                SearchPage::with_cookie(entries, format!("cookie-{}", i + 1).into_bytes())
            };
            self.pages.push_back(Ok(page));
        }
        self
    }

    /// Fail the page request after the scripted ones.
    pub fn with_search_error(mut self, message: &str) -> Self {
        if let Some(Ok(page)) = self.pages.back_mut() {
            if !page.has_more() {
                page.cookie = Some(b"cookie-more".to_vec());
            }
        }
        self.pages
            .push_back(Err(DirectoryError::search_failed(message.to_string())));
        self
    }

    /// Register an entry returned by base-scope reads.
    pub fn with_group(mut self, entry: DirectoryEntry) -> Self {
        self.groups.insert(entry.dn().to_lowercase(), entry);
        self
    }

    pub fn reads(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Read(dn) => Some(dn.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl DirectoryClient for ScriptedDirectory {
    async fn connect(&mut self, connection: &DirectoryConnection) -> DirectoryResult<()> {
        self.calls.push(Call::Connect(connection.url()));
        if self.fail_connect {
            return Err(DirectoryError::connection_failed("connection refused"));
        }
        Ok(())
    }

    async fn bind(&mut self, user: &str, _password: &str) -> DirectoryResult<()> {
        self.calls.push(Call::Bind(user.to_string()));
        if self.fail_bind {
            return Err(DirectoryError::AuthenticationFailed);
        }
        Ok(())
    }

    async fn search_page(
        &mut self,
        request: &PageRequest,
        cookie: Option<&[u8]>,
    ) -> DirectoryResult<SearchPage> {
        self.calls.push(Call::Search(cookie.map(<[u8]>::to_vec)));
        self.last_request = Some(request.clone());
        self.pages
            .pop_front()
            .unwrap_or_else(|| Ok(SearchPage::default()))
    }

    async fn read_entry(&mut self, dn: &str) -> DirectoryResult<Option<DirectoryEntry>> {
        self.calls.push(Call::Read(dn.to_string()));
        Ok(self.groups.get(&dn.to_lowercase()).cloned())
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        self.calls.push(Call::Close);
        Ok(())
    }
}

/// Base configuration shared by the session tests.
pub fn base_source() -> HashMapConfigSource {
    HashMapConfigSource::new()
        .with("cas_import_ad_host", "ldap.example.com")
        .with("cas_import_ad_port", "636")
        .with("cas_import_ad_user", "cn=admin,dc=example,dc=com")
        .with("cas_import_ad_password", "secret")
        .with("cas_import_ad_base_dn", "ou=people,dc=example,dc=com")
        .with("cas_import_ad_sync_filter", "(objectClass=person)")
        .with("cas_import_ad_sync_pagesize", "2")
        .with("cas_import_map_uid", "uid")
        .with("cas_import_map_displayname", "givenName+sn")
        .with("cas_import_map_groups", "isMemberOf")
}

/// A person entry with a uid and group memberships.
pub fn person(uid: &str, memberships: &[&str]) -> DirectoryEntry {
    DirectoryEntry::new(format!("uid={uid},ou=people,dc=example,dc=com"))
        .with("uid", [uid])
        .with("isMemberOf", memberships.iter().copied())
}
