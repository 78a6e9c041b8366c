use super::InventorySource;
use crate::error::InventoryError;
use crate::index::zone_from_url;
use crate::types::{Instance, InstancePage};
use async_trait::async_trait;
use log::{debug, trace};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Accepted file layouts: a bare array of instance records, or a saved
/// aggregated listing (`{"items": {"zones/..": {"instances": [..]}}}`).
#[derive(Deserialize)]
#[serde(untagged)]
enum InventoryDump {
    Instances(Vec<Instance>),
    Aggregated(InstancePage),
}

/// Inventory backed by an exported instance listing on disk.
///
/// The file is re-read on every call so a refresh picks up a new export.
/// Pages are `page_size` instances long and the continuation token is the
/// offset of the next page.
pub struct JsonFileInventory {
    path: PathBuf,
    page_size: usize,
}

impl JsonFileInventory {
    pub fn new(path: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            path: path.into(),
            page_size: page_size.max(1),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<Instance>, InventoryError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let instances = match serde_json::from_slice::<InventoryDump>(&bytes)? {
            InventoryDump::Instances(instances) => instances,
            InventoryDump::Aggregated(page) => page.into_instances(),
        };
        trace!(
            "Loaded {} instances from {}",
            instances.len(),
            self.path.display()
        );
        Ok(instances)
    }
}

#[async_trait]
impl InventorySource for JsonFileInventory {
    async fn list_instances_page(
        &self,
        project_id: &str,
        page_token: Option<&str>,
    ) -> Result<InstancePage, InventoryError> {
        let offset = match page_token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| InventoryError::Fetch(format!("invalid page token `{}`", token)))?,
            None => 0,
        };
        let instances = self.load().await?;
        let end = instances.len().min(offset.saturating_add(self.page_size));

        let mut page = InstancePage::default();
        for instance in instances.iter().skip(offset).take(end.saturating_sub(offset)) {
            let scope = match instance.zone.as_deref() {
                Some(url) => format!("zones/{}", zone_from_url(url)),
                None => "global".to_string(),
            };
            page.items
                .entry(scope)
                .or_default()
                .instances
                .push(instance.clone());
        }
        if end < instances.len() {
            page.next_page_token = Some(end.to_string());
        }
        debug!(
            "Served inventory page for {} at offset {} ({} instances, more: {})",
            project_id,
            offset,
            end.saturating_sub(offset),
            page.next_page_token.is_some()
        );
        Ok(page)
    }

    async fn get_instance(
        &self,
        _project_id: &str,
        instance_id: &str,
        zone: &str,
    ) -> Result<Instance, InventoryError> {
        self.load()
            .await?
            .into_iter()
            .find(|i| {
                // A zoneless instance is cached with an empty zone.
                i.id == instance_id
                    && i.zone.as_deref().map(zone_from_url).unwrap_or_default() == zone
            })
            .ok_or_else(|| InventoryError::NotFound {
                instance_id: instance_id.to_string(),
                zone: zone.to_string(),
            })
    }
}
