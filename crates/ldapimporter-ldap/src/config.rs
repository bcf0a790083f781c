//! LDAP client configuration
//!
//! Transport settings for [`LdapDirectoryClient`](crate::LdapDirectoryClient).
//! Server address and credentials come from the import configuration at
//! connect time and are folded in with [`LdapConfig::apply`].

use ldapimporter_core::traits::DirectoryConnection;
use serde::{Deserialize, Serialize};

/// Configuration for the LDAP directory client.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// LDAP server hostname or IP address.
    #[serde(default)]
    pub host: String,

    /// LDAP server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_ldap_port")]
    pub port: u16,

    /// Use SSL/TLS (LDAPS).
    #[serde(default)]
    pub use_ssl: bool,

    /// Use STARTTLS upgrade on plain LDAP connection.
    #[serde(default)]
    pub use_starttls: bool,

    /// Skip server certificate verification.
    #[serde(default)]
    pub no_tls_verify: bool,

    /// Bind DN for authentication (e.g., "cn=admin,dc=example,dc=com").
    #[serde(default)]
    pub bind_dn: String,

    /// Bind password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_password: Option<String>,

    /// Network timeout for establishing the connection.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Timeout for each search request; 0 disables it.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

impl std::fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("use_ssl", &self.use_ssl)
            .field("use_starttls", &self.use_starttls)
            .field("no_tls_verify", &self.no_tls_verify)
            .field("bind_dn", &self.bind_dn)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***REDACTED***"),
            )
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .finish()
    }
}

fn default_ldap_port() -> u16 {
    389
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_operation_timeout() -> u64 {
    60
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_ldap_port(),
            use_ssl: false,
            use_starttls: false,
            no_tls_verify: false,
            bind_dn: String::new(),
            bind_password: None,
            connection_timeout_secs: default_connection_timeout(),
            operation_timeout_secs: default_operation_timeout(),
        }
    }
}

impl LdapConfig {
    /// Create a config for a host with default transport settings.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Take address and credentials from an import connection, keeping the
    /// transport settings.
    pub fn apply(&self, connection: &DirectoryConnection) -> Self {
        let protocol = connection.protocol.to_ascii_lowercase();
        Self {
            host: connection.host.clone(),
            port: connection.port,
            use_ssl: protocol.starts_with("ldaps"),
            bind_dn: connection.bind_user.clone(),
            bind_password: Some(connection.bind_password.clone()),
            ..self.clone()
        }
    }

    /// Get the LDAP URL.
    #[must_use]
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Reject settings no connection can be made with.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("LDAP host is required".to_string());
        }
        if self.port == 0 {
            return Err("LDAP port must be non-zero".to_string());
        }
        if self.use_ssl && self.use_starttls {
            return Err("LDAPS and STARTTLS are mutually exclusive".to_string());
        }
        Ok(())
    }
}
