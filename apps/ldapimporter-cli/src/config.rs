//! YAML configuration loading
//!
//! The file is shaped `namespace: { key: value }`, mirroring the host's
//! app-config table:
//!
//! ```yaml
//! ldapimporter:
//!   cas_import_ad_host: ad.example.com
//!   cas_import_ad_port: 636
//!   cas_import_map_groups_fonctionel:
//!     - filter: "cn=profs"
//!       naming: "Profs ${nometablissement}"
//! ```
//!
//! Scalars are stored as strings; sequences and mappings are stored as JSON
//! so rule lists can be written as plain YAML.

use std::collections::HashMap;
use std::path::Path;

use ldapimporter_core::config::{keys, HashMapConfigSource, NAMESPACE};
use serde_yaml::Value;
use tracing::debug;

use crate::error::{CliError, CliResult};

/// Environment variable overriding the bind password from the file.
pub const PASSWORD_ENV: &str = "LDAPIMPORTER_AD_PASSWORD";

/// Load a YAML config file into a config source.
pub fn load_config_file(path: &Path) -> CliResult<HashMapConfigSource> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CliError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    let source = parse_config(&content)?;
    debug!(path = %path.display(), "Configuration loaded");
    Ok(source)
}

/// Parse YAML configuration text.
pub fn parse_config(content: &str) -> CliResult<HashMapConfigSource> {
    let raw: HashMap<String, HashMap<String, Value>> = serde_yaml::from_str(content)?;

    let mut source = HashMapConfigSource::new();
    for (namespace, entries) in raw {
        for (key, value) in entries {
            if let Some(value) = scalar_string(value)? {
                source.set(namespace.clone(), key, value);
            }
        }
    }
    Ok(source)
}

/// Apply overrides taken from the environment.
pub fn apply_env_overrides(source: &mut HashMapConfigSource, password: Option<String>) {
    if let Some(password) = password {
        debug!("Bind password taken from environment");
        source.set(NAMESPACE, keys::AD_PASSWORD, password);
    }
}

fn scalar_string(value: Value) -> CliResult<Option<String>> {
    Ok(match value {
        Value::Null => None,
        Value::Bool(b) => Some(if b { "1" } else { "0" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s),
        Value::Tagged(tagged) => scalar_string(tagged.value)?,
        other @ (Value::Sequence(_) | Value::Mapping(_)) => {
            Some(serde_json::to_string(&other)?)
        }
    })
}
