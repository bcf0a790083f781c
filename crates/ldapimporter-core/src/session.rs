//! Import session
//!
//! Drives one import run end to end: connect and bind, prepare the registry
//! schema, page through the directory, and push every entry through
//! projection, group synthesis and merge. Entries are processed strictly one
//! at a time, in page order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::ImportConfig;
use crate::entry::{DirectoryEntry, PageRequest};
use crate::error::{DirectoryError, ImportError, ImportResult};
use crate::groups::GroupNameSynthesizer;
use crate::merge::{merge_users, MergeOutcome};
use crate::model::{EstablishmentRecord, UserMap};
use crate::pager::DirectoryPageReader;
use crate::projector::{project, ProjectionResult};
use crate::registry::EstablishmentRegistry;
use crate::traits::{DirectoryClient, RecordStore};

/// Counters for one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatistics {
    /// Directory pages fetched.
    pub pages: usize,
    /// Directory entries seen.
    pub entries: usize,
    /// Entries merged into the user mapping.
    pub imported: usize,
    /// Entries that shared a uid with an earlier one and were merged.
    pub duplicates: usize,
    /// Entries dropped for an empty uid or no group source.
    pub skipped: usize,
    /// Group names added to users.
    pub groups_synthesized: usize,
    /// Rule evaluations whose filter did not match.
    pub rule_misses: usize,
}

impl ImportStatistics {
    fn record_skip(&mut self, dn: &str, reason: &str) {
        self.skipped += 1;
        debug!(dn = %dn, reason = %reason, "Entry skipped");
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Final uid to user mapping, in first-seen order.
    pub users: UserMap,
    /// Establishments registered so far, this run and earlier ones.
    pub establishments: Vec<EstablishmentRecord>,
    pub statistics: ImportStatistics,
}

/// One import run against one directory connection.
pub struct ImportSession<C: DirectoryClient> {
    config: ImportConfig,
    client: C,
    registry: EstablishmentRegistry,
    connected: bool,
}

impl<C: DirectoryClient> ImportSession<C> {
    /// Create a session. Nothing is opened until [`open`](Self::open).
    pub fn new(config: ImportConfig, client: C, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config,
            client,
            registry: EstablishmentRegistry::new(store),
            connected: false,
        }
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn registry(&self) -> &EstablishmentRegistry {
        &self.registry
    }

    /// Give back the directory client.
    pub fn into_client(self) -> C {
        self.client
    }

    /// Validate the configuration, then connect and bind. Any failure is fatal.
    #[instrument(skip(self), fields(url = %self.config.connection.url()))]
    pub async fn open(&mut self) -> ImportResult<()> {
        self.config.validate()?;

        self.client
            .connect(&self.config.connection)
            .await
            .map_err(ImportError::Connect)?;
        self.connected = true;
        info!("Directory connected");

        let connection = &self.config.connection;
        self.client
            .bind(&connection.bind_user, &connection.bind_password)
            .await
            .map_err(ImportError::Bind)?;
        info!(bind_user = %connection.bind_user, "Directory bound");
        Ok(())
    }

    /// Run the pipeline over every page of the configured search.
    #[instrument(skip(self), fields(base_dn = %self.config.search.base_dn))]
    pub async fn run(&mut self) -> ImportResult<ImportReport> {
        if !self.connected {
            return Err(ImportError::Connect(DirectoryError::NotConnected));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.registry
            .ensure_schema()
            .await
            .map_err(ImportError::Store)?;

        let request = PageRequest::new(
            self.config.search.base_dn.clone(),
            self.config.search.filter.clone(),
            self.config.attributes_to_keep(),
            self.config.search.page_size,
        );
        info!(run_id = %run_id, filter = %request.filter, "Getting all users from the directory");

        let mut users = UserMap::new();
        let mut statistics = ImportStatistics::default();
        let mut reader = DirectoryPageReader::new(request);
        let synthesizer = GroupNameSynthesizer::new(&self.config, &self.registry);

        while let Some(page) = reader
            .next_page(&mut self.client)
            .await
            .map_err(ImportError::Search)?
        {
            statistics.pages += 1;
            for entry in &page.entries {
                process_entry(
                    &self.config,
                    &synthesizer,
                    &mut self.client,
                    entry,
                    &mut users,
                    &mut statistics,
                )
                .await;
            }
        }

        info!(
            run_id = %run_id,
            users = users.len(),
            entries = statistics.entries,
            skipped = statistics.skipped,
            "Users have been retrieved"
        );

        let establishments = match self.registry.establishments().await {
            Ok(establishments) => establishments,
            Err(e) => {
                warn!(error = %e, "Cannot list registered establishments");
                Vec::new()
            }
        };

        Ok(ImportReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            users,
            establishments,
            statistics,
        })
    }

    /// Unbind and release the connection. Errors are logged only.
    pub async fn close(&mut self) {
        if !self.connected {
            return;
        }
        self.connected = false;
        match self.client.close().await {
            Ok(()) => info!("Directory connection closed"),
            Err(e) => warn!(error = %e, "Failed to close directory connection"),
        }
    }

    /// Open, run and close. The connection is closed even if the run fails.
    pub async fn execute(&mut self) -> ImportResult<ImportReport> {
        let result = match self.open().await {
            Ok(()) => self.run().await,
            Err(e) => Err(e),
        };
        self.close().await;
        if let Err(e) = &result {
            warn!(stage = e.stage(), error = %e, "Import aborted");
        }
        result
    }
}

async fn process_entry(
    config: &ImportConfig,
    synthesizer: &GroupNameSynthesizer<'_>,
    client: &mut dyn DirectoryClient,
    entry: &DirectoryEntry,
    users: &mut UserMap,
    statistics: &mut ImportStatistics,
) {
    statistics.entries += 1;

    let ProjectionResult {
        mut user,
        memberships,
    } = project(entry, &config.mapping);
    if user.uid.is_empty() {
        statistics.record_skip(entry.dn(), "empty uid");
        return;
    }

    let mut stats = synthesizer
        .synthesize_functional(&mut user, &memberships)
        .await;
    stats += synthesizer
        .synthesize_pedagogic(&mut user, entry, client)
        .await;
    statistics.groups_synthesized += stats.synthesized;
    statistics.rule_misses += stats.misses;

    if stats.sources == 0 {
        statistics.record_skip(entry.dn(), "no group source");
        return;
    }

    debug!(uid = %user.uid, groups = user.groups.len(), "Adding user");
    statistics.imported += 1;
    if merge_users(users, user, &config.merge) != MergeOutcome::Inserted {
        statistics.duplicates += 1;
    }
}
