//! Entity lookups against the cached indexes.
//!
//! The cache only knows which instance owns an address or name.  On a hit
//! the instance record is fetched live, so the summary always reflects the
//! instance as it is now rather than at the last refresh.

use std::sync::Arc;

use futures_util::future::join_all;
use log::{debug, trace};

use crate::error::LookupError;
use crate::index::{zone_from_url, IndexStore};
use crate::inventory::InventorySource;
use crate::types::{Entity, Instance, LookupData, LookupResult};

/// Results of a batch.  Entities whose live fetch failed appear in `errors`
/// only; every other entity has exactly one entry in `results`.
#[derive(Debug, Default)]
pub struct LookupBatch {
    pub results: Vec<LookupResult>,
    pub errors: Vec<LookupError>,
}

pub struct Resolver {
    source: Arc<dyn InventorySource>,
    store: Arc<IndexStore>,
    project_id: String,
}

impl Resolver {
    pub fn new(
        source: Arc<dyn InventorySource>,
        store: Arc<IndexStore>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            project_id: project_id.into(),
        }
    }

    pub async fn resolve(&self, entity: &Entity) -> Result<LookupResult, LookupError> {
        let found = {
            let index = self.store.snapshot().await;
            if entity.kind.is_ip() {
                index.lookup_ip(&entity.value).cloned()
            } else {
                index.lookup_host(&entity.value).cloned()
            }
        };

        let Some(instance_ref) = found else {
            trace!("No cached instance for {}", entity);
            return Ok(LookupResult::miss(entity.clone()));
        };

        debug!(
            "{} maps to instance {} in {}",
            entity, instance_ref.instance_id, instance_ref.zone
        );
        let instance = self
            .source
            .get_instance(&self.project_id, &instance_ref.instance_id, &instance_ref.zone)
            .await
            .map_err(|source| LookupError {
                entity: entity.value.clone(),
                source,
            })?;

        Ok(LookupResult::hit(
            entity.clone(),
            lookup_data(instance, &entity.value),
        ))
    }

    /// Resolve every entity concurrently.  A failed fetch only affects its
    /// own entity.
    pub async fn resolve_all(&self, entities: &[Entity]) -> LookupBatch {
        let outcomes = join_all(entities.iter().map(|entity| self.resolve(entity))).await;

        let mut batch = LookupBatch::default();
        for outcome in outcomes {
            match outcome {
                Ok(result) => batch.results.push(result),
                Err(e) => batch.errors.push(e),
            }
        }
        batch
    }
}

/// Summary tags for a hit on `queried`.
///
/// The hostname leads unless it is the value that was looked up, followed by
/// the instance name and one `key: value` tag per label.
pub fn summary_tags(instance: &Instance, queried: &str) -> Vec<String> {
    let mut tags = Vec::with_capacity(instance.labels.len() + 2);
    if let Some(hostname) = instance.hostname.as_deref() {
        if !hostname.is_empty() && hostname != queried {
            tags.push(hostname.to_string());
        }
    }
    tags.push(format!("Name: {}", instance.name));
    for (key, value) in &instance.labels {
        tags.push(format!("{}: {}", key, value));
    }
    tags
}

fn lookup_data(instance: Instance, queried: &str) -> LookupData {
    LookupData {
        summary: summary_tags(&instance, queried),
        short_zone: instance.zone.as_deref().map(|z| zone_from_url(z).to_string()),
        short_machine_type: instance
            .machine_type
            .as_deref()
            .map(|m| zone_from_url(m).to_string()),
        details: instance,
    }
}
