//! Establishment registry.
//!
//! Deduplicated store of organizational units keyed by org code ("UAI"), and
//! of the associations between an org code and the group names and uids that
//! refer to it. Both tables are append-only: a row is written only if no row
//! with the same key exists, and existing rows are never updated.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::model::{Association, EstablishmentRecord};
use crate::traits::{Predicate, RecordStore, Row, TableSpec};

/// Table holding `(uai, name)` establishment rows.
pub const ESTABLISHMENTS_TABLE: &str = "etablissements";

/// Table holding `(uai, user_group)` association rows.
pub const ASSOCIATIONS_TABLE: &str = "asso_uai_user_group";

/// Host users table extended with the current org code.
pub const USERS_TABLE: &str = "users";

/// Column added to the host users table.
pub const CURRENT_ORG_CODE_COLUMN: &str = "uai_courant";

const COL_UAI: &str = "uai";
const COL_NAME: &str = "name";
const COL_SUBJECT: &str = "user_group";

/// Registry of establishments and their associations.
#[derive(Clone)]
pub struct EstablishmentRegistry {
    store: Arc<dyn RecordStore>,
}

impl EstablishmentRegistry {
    /// Create a registry over a record store.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create the registry tables and the current-org-code column.
    ///
    /// The registry tables are required. The users column is best effort: an
    /// existing column is expected on reruns, and any other failure (such as
    /// a missing host users table) is logged without aborting the import.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        self.store
            .ensure_table(&TableSpec::new(ESTABLISHMENTS_TABLE, &[COL_NAME, COL_UAI]))
            .await?;
        self.store
            .ensure_table(&TableSpec::new(ASSOCIATIONS_TABLE, &[COL_UAI, COL_SUBJECT]))
            .await?;

        match self
            .store
            .add_column(USERS_TABLE, CURRENT_ORG_CODE_COLUMN)
            .await
        {
            Ok(()) => {}
            Err(e) if e.is_schema_conflict() => {
                info!(
                    column = CURRENT_ORG_CODE_COLUMN,
                    "Column already exists, skipping"
                );
            }
            Err(e) => {
                warn!(
                    table = USERS_TABLE,
                    column = CURRENT_ORG_CODE_COLUMN,
                    error = %e,
                    "Cannot add current org code column"
                );
            }
        }
        Ok(())
    }

    /// Register an establishment unless the org code is already known.
    ///
    /// No-op when `name` is `None`. Returns `true` if a row was written.
    pub async fn ensure_establishment(
        &self,
        org_code: &str,
        name: Option<&str>,
    ) -> StoreResult<bool> {
        let Some(name) = name else {
            return Ok(false);
        };

        let mut row = Row::new();
        row.insert(COL_UAI.to_string(), org_code.to_string());
        row.insert(COL_NAME.to_string(), name.to_string());

        let inserted = self
            .store
            .insert_if_absent(ESTABLISHMENTS_TABLE, &Predicate::eq(COL_UAI, org_code), &row)
            .await?;
        if inserted {
            debug!(uai = %org_code, name = %name, "Registered establishment");
        }
        Ok(inserted)
    }

    /// Link an org code to a group name or uid unless the pair exists.
    ///
    /// No-op when `subject_id` is `None`. Returns `true` if a row was written.
    pub async fn ensure_association(
        &self,
        org_code: &str,
        subject_id: Option<&str>,
    ) -> StoreResult<bool> {
        let Some(subject_id) = subject_id else {
            return Ok(false);
        };

        let mut row = Row::new();
        row.insert(COL_UAI.to_string(), org_code.to_string());
        row.insert(COL_SUBJECT.to_string(), subject_id.to_string());

        let key = Predicate::eq(COL_UAI, org_code).and(COL_SUBJECT, subject_id);
        let inserted = self
            .store
            .insert_if_absent(ASSOCIATIONS_TABLE, &key, &row)
            .await?;
        if inserted {
            debug!(uai = %org_code, subject = %subject_id, "Registered association");
        }
        Ok(inserted)
    }

    /// Look up the registered name of an org code.
    pub async fn lookup_name(&self, org_code: &str) -> StoreResult<Option<String>> {
        let rows = self
            .store
            .select(ESTABLISHMENTS_TABLE, &Predicate::eq(COL_UAI, org_code))
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|mut row| row.remove(COL_NAME)))
    }

    /// All registered establishments.
    pub async fn establishments(&self) -> StoreResult<Vec<EstablishmentRecord>> {
        let rows = self
            .store
            .select(ESTABLISHMENTS_TABLE, &Predicate::all())
            .await?;
        Ok(rows
            .into_iter()
            .map(|mut row| EstablishmentRecord {
                org_code: row.remove(COL_UAI).unwrap_or_default(),
                name: row.remove(COL_NAME).unwrap_or_default(),
            })
            .collect())
    }

    /// All associations registered for an org code.
    pub async fn associations(&self, org_code: &str) -> StoreResult<Vec<Association>> {
        let rows = self
            .store
            .select(ASSOCIATIONS_TABLE, &Predicate::eq(COL_UAI, org_code))
            .await?;
        Ok(rows
            .into_iter()
            .map(|mut row| Association {
                org_code: row.remove(COL_UAI).unwrap_or_default(),
                subject_id: row.remove(COL_SUBJECT).unwrap_or_default(),
            })
            .collect())
    }
}

impl std::fmt::Debug for EstablishmentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EstablishmentRegistry").finish_non_exhaustive()
    }
}
