//! Account merge resolution
//!
//! Directories often expose one person as several entries (for example an
//! administrative and a teaching account) sharing the same uid. The merger
//! folds each candidate into the accumulated [`UserMap`] according to a
//! [`MergePolicy`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{UserMap, UserRecord};

/// Conflict resolution settings for records sharing a uid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePolicy {
    /// Merge records with the same uid instead of overwriting.
    pub enabled: bool,
    /// When exactly one record is enabled, keep it whole.
    pub prefer_enabled: bool,
    /// DN prefix marking the primary account; empty disables the tie-break.
    pub primary_dn_prefix: String,
}

/// Which branch resolved a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No prior record, or merging disabled.
    Inserted,
    /// The enabled record replaced or kept its place, the other was dropped.
    PreferredEnabled,
    /// The DN-prefixed record kept its scalars; groups were unioned.
    PrimaryDn,
    /// The candidate's scalars won; groups were unioned.
    LastSeen,
}

/// Fold `candidate` into `users`.
pub fn merge_users(users: &mut UserMap, candidate: UserRecord, policy: &MergePolicy) -> MergeOutcome {
    if !policy.enabled {
        users.insert(candidate.uid.clone(), candidate);
        return MergeOutcome::Inserted;
    }
    let Some(existing) = users.get_mut(&candidate.uid) else {
        users.insert(candidate.uid.clone(), candidate);
        return MergeOutcome::Inserted;
    };

    let outcome = resolve(existing, candidate, policy);
    debug!(uid = %existing.uid, outcome = ?outcome, "Merged duplicate account");
    outcome
}

fn resolve(existing: &mut UserRecord, candidate: UserRecord, policy: &MergePolicy) -> MergeOutcome {
    if policy.prefer_enabled && existing.enabled != candidate.enabled {
        if candidate.enabled {
            *existing = candidate;
        }
        return MergeOutcome::PreferredEnabled;
    }

    let prefix = policy.primary_dn_prefix.as_str();
    if !prefix.is_empty() {
        let existing_primary = existing.distinguished_name.starts_with(prefix);
        let candidate_primary = candidate.distinguished_name.starts_with(prefix);
        if existing_primary != candidate_primary {
            if candidate_primary {
                let previous = std::mem::replace(existing, candidate);
                existing.union_groups(&previous.groups);
            } else {
                existing.union_groups(&candidate.groups);
            }
            return MergeOutcome::PrimaryDn;
        }
    }

    let previous = std::mem::replace(existing, candidate);
    let mut groups = previous.groups;
    for group in std::mem::take(&mut existing.groups) {
        if !groups.contains(&group) {
            groups.push(group);
        }
    }
    existing.groups = groups;
    MergeOutcome::LastSeen
}
