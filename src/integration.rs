//! Entry points called by the host process.
//!
//! * [`Integration::startup`] fills the cache once before lookups are served.
//! * [`Integration::validate_options`] checks user-supplied options.
//! * [`Integration::do_lookup`] reconciles the refresh schedule and resolves
//!   a batch of entities.

use std::sync::Arc;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::index::IndexStore;
use crate::inventory::InventorySource;
use crate::refresh::{RefreshReport, Refresher};
use crate::resolver::{LookupBatch, Resolver};
use crate::schedule::{self, ScheduleController, DEFAULT_UPDATE_CRON};
use crate::types::Entity;

/// Per-request options supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    pub update_cron: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            update_cron: DEFAULT_UPDATE_CRON.to_string(),
        }
    }
}

pub struct Integration {
    store: Arc<IndexStore>,
    refresher: Arc<Refresher>,
    resolver: Resolver,
    scheduler: ScheduleController,
}

impl Integration {
    pub fn new(source: Arc<dyn InventorySource>, project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        let store = Arc::new(IndexStore::new());
        let refresher = Arc::new(Refresher::new(
            Arc::clone(&source),
            Arc::clone(&store),
            project_id.clone(),
        ));
        let resolver = Resolver::new(source, Arc::clone(&store), project_id);
        let scheduler = ScheduleController::new(Arc::clone(&refresher));
        Self {
            store,
            refresher,
            resolver,
            scheduler,
        }
    }

    /// Run the initial refresh.  A failure is logged and lookups start
    /// against an empty cache.
    pub async fn startup(&self) -> Option<RefreshReport> {
        let report = self.refresher.refresh_logged().await;
        if report.is_none() {
            warn!("Instance cache is empty until the next successful refresh");
        }
        report
    }

    pub fn validate_options(options: &Options) -> Vec<ValidationError> {
        schedule::validate(&options.update_cron)
    }

    pub async fn do_lookup(&self, entities: &[Entity], options: &Options) -> LookupBatch {
        debug!("Looking up {} entities", entities.len());
        self.scheduler.reconcile(&options.update_cron).await;

        let batch = self.resolver.resolve_all(entities).await;
        for e in &batch.errors {
            error!("Error looking up entity: {}", e.report());
        }
        batch
    }

    /// Cancel the refresh job.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    pub fn refresher(&self) -> &Arc<Refresher> {
        &self.refresher
    }

    pub fn scheduler(&self) -> &ScheduleController {
        &self.scheduler
    }
}
