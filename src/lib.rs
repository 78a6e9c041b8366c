//! Reverse-lookup cache from IP addresses and hostnames to Compute Engine
//! instances.
//!
//! The cache is filled by full enumerations of the instance inventory, one
//! at startup and then on a cron schedule, and is swapped atomically after
//! each successful pass.  Lookups map an entity to a cached instance and
//! fetch that instance's current record for the summary.

pub mod config;
pub mod entity;
pub mod error;
pub mod index;
pub mod integration;
pub mod inventory;
pub mod pagination;
pub mod refresh;
pub mod resolver;
pub mod schedule;
pub mod types;

pub use config::Config;
pub use entity::Classifier;
pub use error::{ErrorReport, InventoryError, LookupError, RefreshError, ValidationError};
pub use index::{CacheIndex, IndexStore};
pub use integration::{Integration, Options};
pub use inventory::{InventorySource, JsonFileInventory};
pub use refresh::{RefreshReport, Refresher};
pub use resolver::{LookupBatch, Resolver};
pub use schedule::{CronSchedule, ScheduleController};
pub use types::{Entity, EntityKind, Instance, InstanceRef, LookupResult};
