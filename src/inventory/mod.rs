use crate::error::InventoryError;
use crate::types::{Instance, InstancePage};
use async_trait::async_trait;

pub mod file;
pub use file::JsonFileInventory;

/// Source of truth for compute instances.
///
/// Implementations own credentials and transport; every call is a
/// suspension point and may fail with [`InventoryError`].
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Fetch one page of the aggregated instance listing.
    /// `page_token` is `None` for the first page.
    async fn list_instances_page(
        &self,
        project_id: &str,
        page_token: Option<&str>,
    ) -> Result<InstancePage, InventoryError>;

    /// Fetch the current record for one instance.  `zone` is the short zone name.
    async fn get_instance(
        &self,
        project_id: &str,
        instance_id: &str,
        zone: &str,
    ) -> Result<Instance, InventoryError>;
}
