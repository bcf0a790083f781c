//! Canonical records produced by the import pipeline.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Accumulated import output, keyed by uid in first-seen order.
pub type UserMap = IndexMap<String, UserRecord>;

/// Canonical user model built from one or more directory entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Identity key.
    pub uid: String,
    /// Human-readable name.
    pub display_name: String,
    /// Email address (empty if absent).
    pub email: String,
    /// Storage quota.
    pub quota: u64,
    /// Synthesized group names in discovery order, without duplicates.
    pub groups: Vec<String>,
    /// Whether the account is enabled.
    pub enabled: bool,
    /// Distinguished name of the source entry.
    #[serde(rename = "dn")]
    pub distinguished_name: String,
    /// Current organization code ("UAI").
    #[serde(rename = "uaiCourant")]
    pub current_org_code: String,
}

impl UserRecord {
    /// Create a record with only the identity key set.
    pub fn new(uid: impl Into<String>) -> Self {
        let uid = uid.into();
        Self {
            display_name: uid.clone(),
            uid,
            enabled: true,
            ..Self::default()
        }
    }

    /// Append a group unless it is empty or already present.
    ///
    /// Returns `true` if the group was added.
    pub fn add_group(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if name.is_empty() || self.groups.contains(&name) {
            return false;
        }
        self.groups.push(name);
        true
    }

    /// Append every group from `other` that is not present yet.
    pub fn union_groups(&mut self, other: &[String]) {
        for group in other {
            self.add_group(group.clone());
        }
    }
}

/// A registered organizational unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishmentRecord {
    /// Organization code; unique key.
    pub org_code: String,
    /// First name ever registered for the code.
    pub name: String,
}

/// Link between an organization code and a group name or uid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Organization code.
    pub org_code: String,
    /// Synthesized group name or user uid.
    pub subject_id: String,
}
