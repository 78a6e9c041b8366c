//! Data structures shared by the cache, the refresh job and the resolver.
//!
//! Instance records are deserialised from the Compute Engine JSON shape
//! (`networkIP`, `accessConfigs`, `natIP`, ...).  Only the fields the cache
//! and the summary need are typed; everything else is kept in `extra` so
//! the full record can be handed back to the host as lookup detail.

use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Minimal identifying tuple stored in the cache.
///
/// `zone` is the short zone name (`us-central1-a`), never the zone URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceRef {
    pub instance_id: String,
    pub zone: String,
}

impl InstanceRef {
    pub fn new(instance_id: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            zone: zone.into(),
        }
    }
}

/// A compute instance as returned by the inventory source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Zone URL, e.g. `https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,
    /// Kept in the order the API returned them.
    #[serde(default)]
    pub labels: IndexMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(rename = "networkIP", default, skip_serializing_if = "Option::is_none")]
    pub network_ip: Option<String>,
    #[serde(default)]
    pub access_configs: Vec<AccessConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// External NAT mapping attached to a network interface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    #[serde(rename = "natIP", default, skip_serializing_if = "Option::is_none")]
    pub nat_ip: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Instances grouped under one scope key (`zones/us-central1-a`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionalGroup {
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// One page of the aggregated instance listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePage {
    #[serde(default)]
    pub items: BTreeMap<String, RegionalGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

impl InstancePage {
    /// Continuation token, treating an empty string as absent.
    pub fn continuation(&self) -> Option<&str> {
        self.next_page_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Flattens all regional groups into a single batch.
    pub fn into_instances(self) -> Vec<Instance> {
        self.items
            .into_values()
            .flat_map(|group| group.instances)
            .collect()
    }
}

/// Classification of a lookup input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Ipv4,
    Ipv6,
    Domain,
    /// A custom pattern type, identified by its key (e.g. `zonalDns`).
    Custom(String),
}

impl EntityKind {
    pub fn is_ip(&self) -> bool {
        matches!(self, EntityKind::Ipv4 | EntityKind::Ipv6)
    }
}

/// A value submitted for enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub value: String,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(value: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }

    pub fn ip(value: impl Into<String>) -> Self {
        Self::new(value, EntityKind::Ipv4)
    }

    pub fn domain(value: impl Into<String>) -> Self {
        Self::new(value, EntityKind::Domain)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Data returned for a cache hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupData {
    pub summary: Vec<String>,
    /// Short zone name of the live record, for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_zone: Option<String>,
    /// Short machine type of the live record, for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_machine_type: Option<String>,
    pub details: Instance,
}

/// Result for one entity.  `data` is `None` when the cache has no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupResult {
    pub entity: Entity,
    pub data: Option<LookupData>,
}

impl LookupResult {
    pub fn miss(entity: Entity) -> Self {
        Self { entity, data: None }
    }

    pub fn hit(entity: Entity, data: LookupData) -> Self {
        Self {
            entity,
            data: Some(data),
        }
    }

    pub fn is_hit(&self) -> bool {
        self.data.is_some()
    }
}
