//! Import configuration
//!
//! Deployment settings are read from a host [`ConfigSource`] as flat string
//! values under the `ldapimporter` namespace and turned into typed settings
//! once per session. Missing or malformed values fall back to defaults and
//! nothing here is fatal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::error::{ImportError, ImportResult};
use crate::groups::{FunctionalRule, OrgCodeExtractor, PedagogicRule};
use crate::merge::MergePolicy;
use crate::traits::DirectoryConnection;

/// Namespace every importer key lives under.
pub const NAMESPACE: &str = "ldapimporter";

/// Configuration keys.
pub mod keys {
    pub const AD_HOST: &str = "cas_import_ad_host";
    pub const AD_PORT: &str = "cas_import_ad_port";
    pub const AD_PROTOCOL: &str = "cas_import_ad_protocol";
    pub const AD_USER: &str = "cas_import_ad_user";
    pub const AD_PASSWORD: &str = "cas_import_ad_password";
    pub const AD_BASE_DN: &str = "cas_import_ad_base_dn";
    pub const AD_SYNC_FILTER: &str = "cas_import_ad_sync_filter";
    pub const AD_SYNC_PAGESIZE: &str = "cas_import_ad_sync_pagesize";

    pub const MAP_UID: &str = "cas_import_map_uid";
    pub const MAP_DISPLAYNAME: &str = "cas_import_map_displayname";
    pub const MAP_EMAIL: &str = "cas_import_map_email";
    pub const MAP_GROUPS: &str = "cas_import_map_groups";
    pub const MAP_QUOTA: &str = "cas_import_map_quota";
    pub const MAP_ENABLED: &str = "cas_import_map_enabled";
    pub const MAP_ENABLED_BITWISE: &str = "cas_import_map_enabled_and_bitwise";
    pub const MAP_DN: &str = "cas_import_map_dn";
    pub const MAP_CURRENT_UAI: &str = "cas_import_map_current_uai";

    pub const MAP_GROUPS_FUNCTIONAL: &str = "cas_import_map_groups_fonctionel";
    pub const MAP_GROUPS_PEDAGOGIC: &str = "cas_import_map_groups_pedagogic";

    pub const REGEX_NAME_UAI: &str = "cas_import_regex_name_uai";
    pub const REGEX_UAI_GROUP: &str = "cas_import_regex_uai_group";
    pub const REGEX_NAME_GROUP: &str = "cas_import_regex_name_group";

    pub const PEDAGOGIC_UAI_ATTRIBUTE: &str = "cas_import_pedagogic_uai_attribute";
    pub const PEDAGOGIC_DELIMITER: &str = "cas_import_pedagogic_delimiter";

    pub const MERGE: &str = "cas_import_merge";
    pub const MERGE_ENABLED: &str = "cas_import_merge_enabled";
    pub const MAP_DN_FILTER: &str = "cas_import_map_dn_filter";
}

/// Read-only access to host configuration.
pub trait ConfigSource: Send + Sync {
    /// Value of `key` in `namespace`, if set.
    fn get_value(&self, namespace: &str, key: &str) -> Option<String>;
}

/// [`ConfigSource`] backed by nested maps (namespace, then key).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashMapConfigSource {
    values: HashMap<String, HashMap<String, String>>,
}

impl HashMapConfigSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value.
    pub fn set(
        &mut self,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.values
            .entry(namespace.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Set a value in the importer namespace using builder pattern.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(NAMESPACE, key, value);
        self
    }
}

impl From<HashMap<String, HashMap<String, String>>> for HashMapConfigSource {
    fn from(values: HashMap<String, HashMap<String, String>>) -> Self {
        Self { values }
    }
}

impl ConfigSource for HashMapConfigSource {
    fn get_value(&self, namespace: &str, key: &str) -> Option<String> {
        self.values
            .get(namespace)
            .and_then(|keys| keys.get(key))
            .cloned()
    }
}

/// How the enabled attribute is turned into a boolean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnabledPolicy {
    /// Integer truthiness of the raw value.
    Literal,
    /// Enabled when `raw & mask == 0`.
    Bitmask(u64),
    /// A mask was configured but is not numeric; every user is enabled.
    Malformed(String),
}

impl EnabledPolicy {
    /// Build the policy from the configured mask string.
    pub fn from_mask(mask: &str) -> Self {
        let mask = mask.trim();
        if mask.is_empty() {
            return EnabledPolicy::Literal;
        }
        match mask.parse::<u64>() {
            Ok(bits) => EnabledPolicy::Bitmask(bits),
            Err(_) => {
                warn!(mask = %mask, "Enabled bitmask is not numeric, accounts default to enabled");
                EnabledPolicy::Malformed(mask.to_string())
            }
        }
    }

    /// Evaluate the raw attribute value.
    pub fn is_enabled(&self, raw: &str) -> bool {
        match self {
            // Non-numeric values read as 0.
            EnabledPolicy::Literal => leading_int(raw).is_some_and(|value| value != 0),
            EnabledPolicy::Bitmask(mask) => {
                let value = leading_int(raw).unwrap_or(0);
                // Two's complement, so negative AD values keep their bits.
                (value as u64) & mask == 0
            }
            EnabledPolicy::Malformed(_) => true,
        }
    }
}

/// Directory attribute names for each semantic user field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMapping {
    pub uid: String,
    pub display_name: String,
    /// Appended to `display_name` with a space when both are present.
    pub display_name_secondary: Option<String>,
    pub email: String,
    pub groups: String,
    pub quota: String,
    pub enabled: String,
    pub enabled_policy: EnabledPolicy,
    pub distinguished_name: String,
    pub current_org_code: String,
}

impl Default for AttributeMapping {
    fn default() -> Self {
        Self {
            uid: "uid".to_string(),
            display_name: "cn".to_string(),
            display_name_secondary: None,
            email: "mail".to_string(),
            groups: "memberOf".to_string(),
            quota: String::new(),
            enabled: String::new(),
            enabled_policy: EnabledPolicy::Literal,
            distinguished_name: "dn".to_string(),
            current_org_code: "ESCOUAICourant".to_string(),
        }
    }
}

impl AttributeMapping {
    /// Split a display-name setting: `givenName+sn` means primary `givenName`,
    /// secondary `sn`.
    pub fn set_display_names(&mut self, setting: &str) {
        match setting.split_once('+') {
            Some((primary, secondary)) => {
                self.display_name = primary.trim().to_string();
                let secondary = secondary.trim();
                self.display_name_secondary =
                    (!secondary.is_empty()).then(|| secondary.to_string());
            }
            None => {
                self.display_name = setting.trim().to_string();
                self.display_name_secondary = None;
            }
        }
    }
}

/// Paged search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSettings {
    pub base_dn: String,
    pub filter: String,
    pub page_size: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_dn: String::new(),
            filter: "(objectClass=*)".to_string(),
            page_size: 1000,
        }
    }
}

/// Functional rule as stored in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionalRuleConfig {
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub naming: String,
}

/// Pedagogic rule as stored in configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PedagogicRuleConfig {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub naming: String,
}

/// Everything an import session needs, loaded once and immutable after.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub connection: DirectoryConnection,
    pub search: SearchSettings,
    pub mapping: AttributeMapping,
    pub functional_rules: Vec<FunctionalRule>,
    pub pedagogic_rules: Vec<PedagogicRule>,
    pub org_code: Option<OrgCodeExtractor>,
    /// Org-code attribute of auxiliary pedagogic entries.
    pub pedagogic_org_attribute: String,
    /// Separator between the group DN and the rest of a pedagogic value.
    pub pedagogic_delimiter: char,
    pub merge: MergePolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            connection: DirectoryConnection {
                host: String::new(),
                port: 389,
                protocol: "ldaps://".to_string(),
                bind_user: String::new(),
                bind_password: String::new(),
            },
            search: SearchSettings::default(),
            mapping: AttributeMapping::default(),
            functional_rules: Vec::new(),
            pedagogic_rules: Vec::new(),
            org_code: None,
            pedagogic_org_attribute: "ENTStructureUAI".to_string(),
            pedagogic_delimiter: '$',
            merge: MergePolicy::default(),
        }
    }
}

impl ImportConfig {
    /// Check that a session can be driven from this configuration.
    pub fn validate(&self) -> ImportResult<()> {
        if self.connection.host.is_empty() {
            return Err(ImportError::config(format!(
                "{} is not set",
                keys::AD_HOST
            )));
        }
        Ok(())
    }

    /// Load the configuration from a host source.
    pub fn from_source(source: &dyn ConfigSource) -> Self {
        let reader = Reader { source };
        let mut config = Self::default();

        config.connection.host = reader.string(keys::AD_HOST, "");
        config.connection.port = reader.number(keys::AD_PORT, 389);
        config.connection.protocol = reader.string(keys::AD_PROTOCOL, "ldaps://");
        config.connection.bind_user = reader.string(keys::AD_USER, "");
        config.connection.bind_password = reader.raw(keys::AD_PASSWORD).unwrap_or_default();

        config.search.base_dn = reader.string(keys::AD_BASE_DN, "");
        config.search.filter = reader.string(keys::AD_SYNC_FILTER, "(objectClass=*)");
        config.search.page_size = reader.number(keys::AD_SYNC_PAGESIZE, 1000);

        let mapping = &mut config.mapping;
        mapping.uid = reader.string(keys::MAP_UID, "uid");
        mapping.set_display_names(&reader.string(keys::MAP_DISPLAYNAME, "cn"));
        mapping.email = reader.string(keys::MAP_EMAIL, "mail");
        mapping.groups = reader.string(keys::MAP_GROUPS, "memberOf");
        mapping.quota = reader.string(keys::MAP_QUOTA, "");
        mapping.enabled = reader.string(keys::MAP_ENABLED, "");
        mapping.enabled_policy =
            EnabledPolicy::from_mask(&reader.string(keys::MAP_ENABLED_BITWISE, ""));
        mapping.distinguished_name = reader.string(keys::MAP_DN, "dn");
        mapping.current_org_code = reader.string(keys::MAP_CURRENT_UAI, "ESCOUAICourant");

        config.functional_rules = reader
            .json_list::<FunctionalRuleConfig>(keys::MAP_GROUPS_FUNCTIONAL)
            .iter()
            .filter_map(FunctionalRule::from_config)
            .collect();
        config.pedagogic_rules = reader
            .json_list::<PedagogicRuleConfig>(keys::MAP_GROUPS_PEDAGOGIC)
            .iter()
            .filter_map(PedagogicRule::from_config)
            .collect();

        config.org_code = OrgCodeExtractor::compile(
            &reader.string(keys::REGEX_NAME_UAI, ""),
            reader.number(keys::REGEX_UAI_GROUP, 1),
            reader.number(keys::REGEX_NAME_GROUP, 2),
        );

        config.pedagogic_org_attribute =
            reader.string(keys::PEDAGOGIC_UAI_ATTRIBUTE, "ENTStructureUAI");
        config.pedagogic_delimiter = reader
            .string(keys::PEDAGOGIC_DELIMITER, "$")
            .chars()
            .next()
            .unwrap_or('$');

        config.merge = MergePolicy {
            enabled: reader.flag(keys::MERGE),
            prefer_enabled: reader.flag(keys::MERGE_ENABLED),
            primary_dn_prefix: reader.string(keys::MAP_DN_FILTER, ""),
        };

        config
    }

    /// Attributes requested from the directory for each user entry.
    ///
    /// Empty names are dropped and duplicates removed, first occurrence wins.
    pub fn attributes_to_keep(&self) -> Vec<String> {
        let mapping = &self.mapping;
        let mut names: Vec<&str> = vec![
            &mapping.uid,
            &mapping.display_name,
            mapping.display_name_secondary.as_deref().unwrap_or(""),
            &mapping.email,
            &mapping.groups,
            &mapping.quota,
            &mapping.enabled,
            &mapping.distinguished_name,
            &mapping.current_org_code,
        ];
        names.extend(self.pedagogic_rules.iter().map(PedagogicRule::field));

        let mut keep: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            if name.is_empty() || keep.iter().any(|k| k.eq_ignore_ascii_case(name)) {
                continue;
            }
            keep.push(name.to_string());
        }
        keep
    }
}

struct Reader<'a> {
    source: &'a dyn ConfigSource,
}

impl Reader<'_> {
    fn raw(&self, key: &str) -> Option<String> {
        self.source.get_value(NAMESPACE, key)
    }

    fn string(&self, key: &str, default: &str) -> String {
        match self.raw(key) {
            Some(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => default.to_string(),
        }
    }

    fn number<T: std::str::FromStr + Copy>(&self, key: &str, default: T) -> T {
        let Some(value) = self.raw(key) else {
            return default;
        };
        let value = value.trim();
        if value.is_empty() {
            return default;
        }
        value.parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %value, "Ignoring non-numeric setting");
            default
        })
    }

    fn flag(&self, key: &str) -> bool {
        self.raw(key).is_some_and(|value| parse_flag(&value))
    }

    fn json_list<T: serde::de::DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let Some(value) = self.raw(key) else {
            return Vec::new();
        };
        if value.trim().is_empty() {
            return Vec::new();
        }
        serde_json::from_str(&value).unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "Rule list is not valid JSON, ignoring");
            Vec::new()
        })
    }
}

/// Host boolean convention.
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Leading integer of a string (`"42abc"` is 42), or `None` without digits.
pub(crate) fn leading_int(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (negative, digits) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude: i64 = digits[..end].parse().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Quota value of a raw attribute or filter: leading integer, negative or
/// missing coerced to 0.
pub(crate) fn quota_value(value: &str) -> u64 {
    leading_int(value)
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or(0)
}
