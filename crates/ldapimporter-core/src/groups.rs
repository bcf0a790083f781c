//! Group name synthesis
//!
//! Turns raw directory group strings into readable group names through two
//! independent rule sets:
//!
//! - **Functional** rules apply to the group-membership attribute. Rules are
//!   scanned in order and the first whose filter matches names the group.
//! - **Pedagogic** rules each read their own source attribute. A matching
//!   value carries the DN of a group entry before a delimiter; that entry is
//!   fetched from the directory and its attributes feed the naming template.
//!
//! Both pipelines register establishments and associations in the
//! [`EstablishmentRegistry`] as a side effect. Nothing in this module is
//! fatal: misses, unresolved placeholders, failed lookups and store errors
//! are logged and the affected group is skipped.

use regex::{Captures, Regex, RegexBuilder};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::{quota_value, FunctionalRuleConfig, ImportConfig, PedagogicRuleConfig};
use crate::entry::DirectoryEntry;
use crate::error::StoreResult;
use crate::model::UserRecord;
use crate::registry::EstablishmentRegistry;
use crate::template::{NamingTemplate, Placeholder, PlaceholderResolver};
use crate::traits::DirectoryClient;

/// Compile a rule pattern: case-insensitive, `.` matches newlines.
fn compile_pattern(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Invalid rule regex, rule disabled");
            None
        }
    }
}

/// Ordered functional rule: filter regex plus naming template.
#[derive(Debug, Clone)]
pub struct FunctionalRule {
    filter: String,
    regex: Regex,
    naming: NamingTemplate,
}

impl FunctionalRule {
    /// Compile a rule. Returns `None` (rule disabled) if either part is empty
    /// or the filter is not a valid regex.
    pub fn new(filter: &str, naming: &str) -> Option<Self> {
        if filter.is_empty() || naming.is_empty() {
            debug!(filter = %filter, naming = %naming, "Functional rule incomplete, skipped");
            return None;
        }
        Some(Self {
            filter: filter.to_string(),
            regex: compile_pattern(filter)?,
            naming: NamingTemplate::parse(naming),
        })
    }

    /// Compile a rule from its configuration form.
    pub fn from_config(config: &FunctionalRuleConfig) -> Option<Self> {
        Self::new(&config.filter, &config.naming)
    }

    /// The filter as configured.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// The naming template.
    pub fn naming(&self) -> &NamingTemplate {
        &self.naming
    }

    /// Quota a matching value escalates the user to (leading integer of the
    /// filter text, 0 if none).
    pub fn quota_floor(&self) -> u64 {
        quota_value(&self.filter)
    }
}

/// Pedagogic rule bound to a source attribute.
#[derive(Debug, Clone)]
pub struct PedagogicRule {
    field: String,
    filter: String,
    regex: Regex,
    naming: NamingTemplate,
}

impl PedagogicRule {
    /// Compile a rule. Returns `None` if any part is empty or the filter is
    /// not a valid regex.
    pub fn new(field: &str, filter: &str, naming: &str) -> Option<Self> {
        if field.is_empty() || filter.is_empty() || naming.is_empty() {
            debug!(field = %field, filter = %filter, "Pedagogic rule incomplete, skipped");
            return None;
        }
        Some(Self {
            field: field.to_lowercase(),
            filter: filter.to_string(),
            regex: compile_pattern(filter)?,
            naming: NamingTemplate::parse(naming),
        })
    }

    /// Compile a rule from its configuration form.
    pub fn from_config(config: &PedagogicRuleConfig) -> Option<Self> {
        Self::new(&config.field, &config.filter, &config.naming)
    }

    /// Lower-cased source attribute.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn naming(&self) -> &NamingTemplate {
        &self.naming
    }
}

/// Org code and establishment name found inside a raw group value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrgCodeMatch {
    pub code: String,
    pub name: Option<String>,
}

/// Extracts an org code ("UAI") and establishment name from raw values.
#[derive(Debug, Clone)]
pub struct OrgCodeExtractor {
    regex: Regex,
    code_group: usize,
    name_group: usize,
}

impl OrgCodeExtractor {
    /// Compile the extractor. An empty pattern disables extraction.
    pub fn compile(pattern: &str, code_group: usize, name_group: usize) -> Option<Self> {
        if pattern.is_empty() {
            return None;
        }
        Some(Self {
            regex: compile_pattern(pattern)?,
            code_group,
            name_group,
        })
    }

    /// Apply the pattern to a raw value.
    ///
    /// Matches only when the pattern has at least two capture groups and the
    /// code group took part in the match.
    pub fn extract(&self, value: &str) -> Option<OrgCodeMatch> {
        let caps = self.regex.captures(value)?;
        if caps.len() < 3 {
            return None;
        }
        let code = caps.get(self.code_group)?.as_str();
        if code.is_empty() {
            return None;
        }
        Some(OrgCodeMatch {
            code: code.to_string(),
            name: caps
                .get(self.name_group)
                .map(|m| m.as_str().to_string())
                .filter(|name| !name.is_empty()),
        })
    }
}

/// Owned copy of a filter match, indexed and by group name.
#[derive(Debug, Default)]
struct CaptureValues {
    indexed: Vec<Option<String>>,
    named: HashMap<String, String>,
}

impl CaptureValues {
    fn new(regex: &Regex, caps: &Captures<'_>) -> Self {
        let indexed = caps
            .iter()
            .map(|m| m.map(|m| m.as_str().to_string()))
            .collect();
        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_lowercase(), m.as_str().to_string()))
            })
            .collect();
        Self { indexed, named }
    }

    fn index(&self, index: usize) -> Option<String> {
        self.indexed.get(index).cloned().flatten()
    }

    fn name(&self, name: &str) -> Option<String> {
        self.named.get(&name.to_lowercase()).cloned()
    }
}

struct FunctionalContext<'a> {
    captures: &'a CaptureValues,
    establishment_name: Option<&'a str>,
}

impl PlaceholderResolver for FunctionalContext<'_> {
    fn resolve(&self, placeholder: &Placeholder) -> Option<String> {
        match placeholder {
            Placeholder::Capture(index) => self.captures.index(*index),
            Placeholder::Attribute(name) => self.captures.name(name),
            Placeholder::EstablishmentName => self.establishment_name.map(str::to_string),
        }
    }
}

struct PedagogicContext<'a> {
    captures: &'a CaptureValues,
    group_entry: &'a DirectoryEntry,
    establishment_name: Option<&'a str>,
}

impl PlaceholderResolver for PedagogicContext<'_> {
    fn resolve(&self, placeholder: &Placeholder) -> Option<String> {
        match placeholder {
            Placeholder::Capture(index) => self.captures.index(*index),
            Placeholder::Attribute(name) => self.group_entry.first(name).map(str::to_string),
            Placeholder::EstablishmentName => self.establishment_name.map(str::to_string),
        }
    }
}

/// Per-user synthesis counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisStats {
    /// Group names added to the user.
    pub synthesized: usize,
    /// Rule evaluations whose filter did not match.
    pub misses: usize,
    /// Source values that qualify the user for import.
    pub sources: usize,
}

impl std::ops::AddAssign for SynthesisStats {
    fn add_assign(&mut self, other: Self) {
        self.synthesized += other.synthesized;
        self.misses += other.misses;
        self.sources += other.sources;
    }
}

fn absorb<T>(result: StoreResult<T>, operation: &str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation = %operation, error = %e, "Establishment registry call failed");
            None
        }
    }
}

/// Runs both rule sets for one user at a time.
pub struct GroupNameSynthesizer<'a> {
    config: &'a ImportConfig,
    registry: &'a EstablishmentRegistry,
}

impl<'a> GroupNameSynthesizer<'a> {
    pub fn new(config: &'a ImportConfig, registry: &'a EstablishmentRegistry) -> Self {
        Self { config, registry }
    }

    /// Run the functional rules over the user's group-membership values.
    ///
    /// Appends at most one group per raw value and may raise the user's quota.
    pub async fn synthesize_functional(
        &self,
        user: &mut UserRecord,
        values: &[String],
    ) -> SynthesisStats {
        let mut stats = SynthesisStats {
            sources: values.len(),
            ..SynthesisStats::default()
        };

        for value in values {
            let org = self
                .config
                .org_code
                .as_ref()
                .and_then(|extractor| extractor.extract(value));
            if let Some(org) = &org {
                absorb(
                    self.registry
                        .ensure_establishment(&org.code, org.name.as_deref())
                        .await,
                    "ensure_establishment",
                );
            }

            let mut group_name = None;
            for rule in &self.config.functional_rules {
                let Some(caps) = rule.regex.captures(value) else {
                    warn!(rule = %rule.filter, group = %value, "Functional rule does not match");
                    stats.misses += 1;
                    continue;
                };
                let captures = CaptureValues::new(&rule.regex, &caps);

                let floor = rule.quota_floor();
                if floor > user.quota {
                    debug!(uid = %user.uid, quota = floor, "Quota raised by functional rule");
                    user.quota = floor;
                }

                let context = FunctionalContext {
                    captures: &captures,
                    establishment_name: org.as_ref().and_then(|o| o.name.as_deref()),
                };
                let expansion = rule.naming.expand(&context);
                for placeholder in &expansion.unresolved {
                    warn!(
                        rule = %rule.filter,
                        placeholder = %placeholder,
                        "Unresolved placeholder in functional naming"
                    );
                }
                group_name = Some(expansion.name).filter(|name| !name.is_empty());

                if let (Some(org), Some(name)) = (&org, &group_name) {
                    absorb(
                        self.registry.ensure_association(&org.code, Some(name.as_str())).await,
                        "ensure_association",
                    );
                    absorb(
                        self.registry
                            .ensure_association(&org.code, Some(user.uid.as_str()))
                            .await,
                        "ensure_association",
                    );
                }
                break;
            }

            if let Some(name) = group_name {
                if user.add_group(name.clone()) {
                    info!(uid = %user.uid, group = %name, "Functional group added");
                    stats.synthesized += 1;
                }
            }
        }

        stats
    }

    /// Run the pedagogic rules over the entry's source attributes.
    ///
    /// Each qualifying value triggers a base-scope read of its group entry
    /// through `client`. A failed read skips that group only.
    pub async fn synthesize_pedagogic(
        &self,
        user: &mut UserRecord,
        entry: &DirectoryEntry,
        client: &mut dyn DirectoryClient,
    ) -> SynthesisStats {
        let mut stats = SynthesisStats::default();
        let delimiter = self.config.pedagogic_delimiter;
        let org_attribute = self.config.pedagogic_org_attribute.as_str();

        for rule in &self.config.pedagogic_rules {
            let Some(values) = entry.get(&rule.field) else {
                continue;
            };

            for value in values {
                let Some(caps) = rule.regex.captures(value) else {
                    warn!(rule = %rule.filter, group = %value, "Pedagogic rule does not match");
                    stats.misses += 1;
                    continue;
                };
                let captures = CaptureValues::new(&rule.regex, &caps);

                let group_dn = match value.find(delimiter) {
                    Some(pos) if pos > 0 => &value[..pos],
                    _ => {
                        debug!(group = %value, "Pedagogic value has no group reference");
                        continue;
                    }
                };
                stats.sources += 1;

                let group_entry = match client.read_entry(group_dn).await {
                    Ok(Some(found)) => found,
                    Ok(None) => {
                        debug!(dn = %group_dn, "Pedagogic group entry not found");
                        DirectoryEntry::new(group_dn)
                    }
                    Err(e) => {
                        warn!(dn = %group_dn, error = %e, "Pedagogic group lookup failed, skipping");
                        continue;
                    }
                };

                let org_code = group_entry.first(org_attribute).map(str::to_string);
                let establishment_name = match &org_code {
                    Some(code) if rule.naming.needs_establishment_name() => {
                        absorb(self.registry.lookup_name(code).await, "lookup_name").flatten()
                    }
                    _ => None,
                };

                let context = PedagogicContext {
                    captures: &captures,
                    group_entry: &group_entry,
                    establishment_name: establishment_name.as_deref(),
                };
                let expansion = rule.naming.expand(&context);
                for placeholder in &expansion.unresolved {
                    warn!(
                        field = %rule.field,
                        placeholder = %placeholder,
                        dn = %group_dn,
                        "Unresolved placeholder in pedagogic naming"
                    );
                }
                if expansion.name.is_empty() {
                    continue;
                }

                if let Some(code) = &org_code {
                    absorb(
                        self.registry
                            .ensure_association(code, Some(expansion.name.as_str()))
                            .await,
                        "ensure_association",
                    );
                    absorb(
                        self.registry.ensure_association(code, Some(user.uid.as_str())).await,
                        "ensure_association",
                    );
                }

                if user.add_group(expansion.name.clone()) {
                    info!(uid = %user.uid, group = %expansion.name, "Pedagogic group added");
                    stats.synthesized += 1;
                }
            }
        }

        stats
    }
}
