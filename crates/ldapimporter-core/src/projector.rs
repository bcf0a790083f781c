//! Attribute projection
//!
//! Maps one raw [`DirectoryEntry`] onto a candidate [`UserRecord`] through the
//! configured [`AttributeMapping`]. Projection never fails: absent attributes
//! become empty strings, 0 or `true`.

use crate::config::{quota_value, AttributeMapping};
use crate::entry::DirectoryEntry;
use crate::model::UserRecord;

/// A projected user plus the raw group-membership values of its entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectionResult {
    pub user: UserRecord,
    /// Raw values of the group-membership attribute, in server order.
    pub memberships: Vec<String>,
}

/// Project an entry into a candidate user record.
pub fn project(entry: &DirectoryEntry, mapping: &AttributeMapping) -> ProjectionResult {
    let text = |name: &str| entry.first(name).unwrap_or_default().to_string();

    let uid = text(&mapping.uid);
    let mut user = UserRecord::new(uid.clone());
    user.display_name = display_name(entry, mapping).unwrap_or(uid);
    user.email = text(&mapping.email);
    user.distinguished_name = text(&mapping.distinguished_name);
    user.current_org_code = text(&mapping.current_org_code);
    user.quota = entry.first(&mapping.quota).map_or(0, quota_value);
    user.enabled = entry
        .first(&mapping.enabled)
        .map_or(true, |raw| mapping.enabled_policy.is_enabled(raw));

    let memberships = if mapping.groups.is_empty() {
        Vec::new()
    } else {
        entry.get(&mapping.groups).map(<[String]>::to_vec).unwrap_or_default()
    };

    ProjectionResult { user, memberships }
}

fn display_name(entry: &DirectoryEntry, mapping: &AttributeMapping) -> Option<String> {
    let primary = entry.first(&mapping.display_name);
    let secondary = mapping
        .display_name_secondary
        .as_deref()
        .and_then(|name| entry.first(name));

    match (primary, secondary) {
        (Some(primary), Some(secondary)) => Some(format!("{primary} {secondary}")),
        (Some(primary), None) => Some(primary.to_string()),
        (None, Some(secondary)) => Some(secondary.to_string()),
        (None, None) => None,
    }
}
