//! LDAP directory client
//!
//! [`DirectoryClient`] implementation over `ldap3`, using the simple paged
//! results control (RFC 2696) for subtree searches.

use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults, RawControl};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use ldapimporter_core::entry::{DirectoryEntry, PageRequest, SearchPage};
use ldapimporter_core::error::{DirectoryError, DirectoryResult};
use ldapimporter_core::traits::{DirectoryClient, DirectoryConnection};

use crate::config::LdapConfig;

/// LDAP result code for invalid credentials.
const RC_INVALID_CREDENTIALS: u32 = 49;

/// LDAP result code for a missing base object.
const RC_NO_SUCH_OBJECT: u32 = 32;

/// Directory client backed by a single `ldap3` connection.
pub struct LdapDirectoryClient {
    config: LdapConfig,
    ldap: Option<Ldap>,
}

impl std::fmt::Debug for LdapDirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectoryClient")
            .field("config", &self.config)
            .field("connected", &self.ldap.is_some())
            .finish()
    }
}

impl Default for LdapDirectoryClient {
    fn default() -> Self {
        Self::new(LdapConfig::default())
    }
}

impl LdapDirectoryClient {
    /// Create a client with the given transport settings.
    ///
    /// Host, port and credentials are taken from the connection passed to
    /// [`DirectoryClient::connect`].
    pub fn new(config: LdapConfig) -> Self {
        Self { config, ldap: None }
    }

    /// Get the effective configuration.
    pub fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// Check whether a connection is open.
    pub fn is_connected(&self) -> bool {
        self.ldap.is_some()
    }

    fn handle(&mut self) -> DirectoryResult<&mut Ldap> {
        self.ldap.as_mut().ok_or(DirectoryError::NotConnected)
    }

    fn operation_timeout(&self) -> Option<Duration> {
        (self.config.operation_timeout_secs > 0)
            .then(|| Duration::from_secs(self.config.operation_timeout_secs))
    }
}

/// Convert an `ldap3` search entry; binary-only attributes are dropped.
pub fn to_directory_entry(entry: SearchEntry) -> DirectoryEntry {
    if !entry.bin_attrs.is_empty() {
        debug!(
            dn = %entry.dn,
            count = entry.bin_attrs.len(),
            "Skipping binary attributes"
        );
    }
    let mut converted = DirectoryEntry::new(entry.dn);
    for (name, values) in entry.attrs {
        converted.set(&name, values);
    }
    converted
}

/// Extract the continuation cookie from a response's controls.
///
/// An empty cookie means the server has no more pages.
pub fn paged_cookie(controls: &[Control]) -> Option<Vec<u8>> {
    controls.iter().find_map(|Control(ctype, raw)| match ctype {
        Some(ControlType::PagedResults) if raw.val.is_some() => {
            Some(raw.parse::<PagedResults>().cookie)
        }
        _ => None,
    })
}

/// Build the paged results request control.
fn paged_control(page_size: u32, cookie: Option<&[u8]>) -> RawControl {
    PagedResults {
        size: i32::try_from(page_size).unwrap_or(i32::MAX),
        cookie: cookie.map(<[u8]>::to_vec).unwrap_or_default(),
    }
    .into()
}

#[async_trait]
impl DirectoryClient for LdapDirectoryClient {
    #[instrument(skip(self, connection), fields(host = %connection.host, port = connection.port))]
    async fn connect(&mut self, connection: &DirectoryConnection) -> DirectoryResult<()> {
        let config = self.config.apply(connection);
        config.validate().map_err(DirectoryError::connection_failed)?;
        let url = config.url();

        debug!(url = %url, "Connecting to LDAP server");

        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(config.connection_timeout_secs))
            .set_starttls(config.use_starttls)
            .set_no_tls_verify(config.no_tls_verify);

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|e| {
                DirectoryError::connection_failed_with_source(
                    format!("Failed to connect to LDAP server at {}", url),
                    e,
                )
            })?;

        // Spawn the connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        self.config = config;
        self.ldap = Some(ldap);
        info!(url = %url, "LDAP connection established");
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn bind(&mut self, user: &str, password: &str) -> DirectoryResult<()> {
        let ldap = self.handle()?;

        debug!(bind_dn = %user, "Performing LDAP bind");

        let result = ldap.simple_bind(user, password).await.map_err(|e| {
            DirectoryError::connection_failed_with_source(format!("LDAP bind failed for {}", user), e)
        })?;

        if result.rc != 0 {
            if result.rc == RC_INVALID_CREDENTIALS {
                return Err(DirectoryError::AuthenticationFailed);
            }
            return Err(DirectoryError::BindFailed {
                message: format!("LDAP bind failed with code {}: {}", result.rc, result.text),
            });
        }

        info!(bind_dn = %user, "LDAP bind succeeded");
        Ok(())
    }

    #[instrument(skip(self, request, cookie), fields(base_dn = %request.base_dn, page_size = request.page_size))]
    async fn search_page(
        &mut self,
        request: &PageRequest,
        cookie: Option<&[u8]>,
    ) -> DirectoryResult<SearchPage> {
        let timeout = self.operation_timeout();
        let ldap = self.handle()?;
        if let Some(timeout) = timeout {
            ldap.with_timeout(timeout);
        }

        debug!(filter = %request.filter, continued = cookie.is_some(), "Searching LDAP page");

        let ldap3::SearchResult(entries, result) = ldap
            .with_controls(paged_control(request.page_size, cookie))
            .search(
                &request.base_dn,
                Scope::Subtree,
                &request.filter,
                &request.attributes,
            )
            .await
            .map_err(|e| DirectoryError::search_failed_with_source("LDAP search failed", e))?;

        if result.rc == RC_NO_SUCH_OBJECT {
            return Err(DirectoryError::NoSuchObject {
                dn: request.base_dn.clone(),
            });
        }
        if result.rc != 0 {
            return Err(DirectoryError::search_failed(format!(
                "LDAP search failed with code {}: {}",
                result.rc, result.text
            )));
        }

        let cookie = paged_cookie(&result.ctrls);
        let entries: Vec<DirectoryEntry> = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(to_directory_entry)
            .collect();

        debug!(
            count = entries.len(),
            more = cookie.as_ref().is_some_and(|c| !c.is_empty()),
            "LDAP page received"
        );

        Ok(SearchPage { entries, cookie })
    }

    #[instrument(skip(self))]
    async fn read_entry(&mut self, dn: &str) -> DirectoryResult<Option<DirectoryEntry>> {
        let timeout = self.operation_timeout();
        let ldap = self.handle()?;
        if let Some(timeout) = timeout {
            ldap.with_timeout(timeout);
        }

        let ldap3::SearchResult(entries, result) = ldap
            .search(dn, Scope::Base, "(objectClass=*)", vec!["*"])
            .await
            .map_err(|e| DirectoryError::search_failed_with_source(format!("LDAP read failed for {}", dn), e))?;

        if result.rc == RC_NO_SUCH_OBJECT {
            debug!(dn = %dn, "Entry not found");
            return Ok(None);
        }
        if result.rc != 0 {
            return Err(DirectoryError::search_failed(format!(
                "LDAP read of {} failed with code {}: {}",
                dn, result.rc, result.text
            )));
        }

        Ok(entries
            .into_iter()
            .next()
            .map(SearchEntry::construct)
            .map(to_directory_entry))
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        if let Some(mut ldap) = self.ldap.take() {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "Error during LDAP unbind");
            }
            debug!("LDAP connection closed");
        }
        Ok(())
    }
}
