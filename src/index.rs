//! Reverse-lookup indexes from network identifiers to instances.
//!
//! A [`CacheIndex`] is built from scratch during a refresh pass and then
//! published through [`IndexStore::replace`].  Readers take an
//! `Arc<CacheIndex>` snapshot, so a lookup never sees a half-built index
//! and a failed pass never touches the published one.

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;
use tokio::sync::RwLock;

use crate::types::{Instance, InstanceRef};

/// Short zone name from a zone URL: the final `/`-delimited segment.
///
/// A value without `/` is returned unchanged.
pub fn zone_from_url(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Internal zonal DNS name: `<instance>.<zone>.c.<project>.internal`.
pub fn zonal_dns_name(instance_name: &str, zone: &str, project_id: &str) -> String {
    format!("{}.{}.c.{}.internal", instance_name, zone, project_id)
}

/// IP and hostname tables for one refresh pass.
///
/// Later inserts overwrite earlier ones for the same key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheIndex {
    ips: HashMap<String, InstanceRef>,
    hosts: HashMap<String, InstanceRef>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive every lookup key an instance provides.
    ///
    /// Missing fields only reduce coverage: an instance without a zone still
    /// contributes its IPs and hostname, but no zonal DNS name.
    pub fn index(&mut self, instance: &Instance, project_id: &str) {
        let zone = instance.zone.as_deref().map(zone_from_url).unwrap_or_default();
        let instance_ref = InstanceRef::new(instance.id.clone(), zone);

        for nic in &instance.network_interfaces {
            if let Some(ip) = non_empty(nic.network_ip.as_deref()) {
                self.ips.insert(ip.to_string(), instance_ref.clone());
            }
            for access in &nic.access_configs {
                if let Some(nat_ip) = non_empty(access.nat_ip.as_deref()) {
                    self.ips.insert(nat_ip.to_string(), instance_ref.clone());
                }
            }
        }

        if let Some(hostname) = non_empty(instance.hostname.as_deref()) {
            self.hosts.insert(hostname.to_string(), instance_ref.clone());
        }

        if !zone.is_empty() && !instance.name.is_empty() {
            let dns = zonal_dns_name(&instance.name, zone, project_id);
            trace!("Indexed {} as {}", instance.id, dns);
            self.hosts.insert(dns, instance_ref);
        }
    }

    pub fn lookup_ip(&self, ip: &str) -> Option<&InstanceRef> {
        self.ips.get(ip)
    }

    pub fn lookup_host(&self, hostname: &str) -> Option<&InstanceRef> {
        self.hosts.get(hostname)
    }

    pub fn ip_count(&self) -> usize {
        self.ips.len()
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty() && self.hosts.is_empty()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Holder of the live index.  Written only by the refresh orchestrator.
#[derive(Debug, Default)]
pub struct IndexStore {
    live: RwLock<Arc<CacheIndex>>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current index.  Cheap; holds the read lock only for the clone.
    pub async fn snapshot(&self) -> Arc<CacheIndex> {
        Arc::clone(&*self.live.read().await)
    }

    /// Publish a fully built index and return the one it replaced.
    pub async fn replace(&self, next: CacheIndex) -> Arc<CacheIndex> {
        let mut live = self.live.write().await;
        std::mem::replace(&mut *live, Arc::new(next))
    }
}
