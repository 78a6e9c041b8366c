//! Scripted inventory used by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gce_lookup::types::{AccessConfig, InstancePage, NetworkInterface};
use gce_lookup::{Instance, InventoryError, InventorySource};
use tokio::sync::Notify;

pub const PROJECT: &str = "proj1";

pub fn zone_url(zone: &str) -> String {
    format!(
        "https://www.googleapis.com/compute/v1/projects/{}/zones/{}",
        PROJECT, zone
    )
}

/// Instance with one interface and an optional NAT address.
pub fn instance(id: &str, name: &str, zone: &str, ip: &str, nat_ip: Option<&str>) -> Instance {
    Instance {
        id: id.into(),
        name: name.into(),
        zone: Some(zone_url(zone)),
        network_interfaces: vec![NetworkInterface {
            network_ip: Some(ip.into()),
            access_configs: nat_ip
                .map(|nat| {
                    vec![AccessConfig {
                        nat_ip: Some(nat.into()),
                        ..Default::default()
                    }]
                })
                .unwrap_or_default(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// `web1` from the reference example.
pub fn web1() -> Instance {
    let mut web1 = instance("123", "web1", "us-central1-a", "10.0.0.5", Some("35.1.2.3"));
    web1.hostname = Some("web1.example.com".into());
    web1.labels.insert("env".into(), "prod".into());
    web1
}

struct Gate {
    page: usize,
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

/// Serves a fixed list of pages (page `n` has token `"n"`), with optional
/// failure and pause injection.
#[derive(Default)]
pub struct ScriptedInventory {
    pages: Mutex<Vec<Vec<Instance>>>,
    fail_on_page: Mutex<Option<usize>>,
    gate: Mutex<Option<Gate>>,
    live: Mutex<HashMap<String, Instance>>,
    broken_details: Mutex<HashSet<String>>,
    list_calls: AtomicUsize,
    get_calls: AtomicUsize,
}

impl ScriptedInventory {
    pub fn new(pages: Vec<Vec<Instance>>) -> Arc<Self> {
        let inventory = Self::default();
        inventory.set_pages(pages);
        Arc::new(inventory)
    }

    /// Replace the listing.  Live records follow the new listing.
    pub fn set_pages(&self, pages: Vec<Vec<Instance>>) {
        let mut live = self.live.lock().unwrap();
        live.clear();
        for instance in pages.iter().flatten() {
            live.insert(instance.id.clone(), instance.clone());
        }
        *self.pages.lock().unwrap() = pages;
    }

    /// Change the live record without touching the listing.
    pub fn update_live(&self, instance: Instance) {
        self.live
            .lock()
            .unwrap()
            .insert(instance.id.clone(), instance);
    }

    pub fn fail_on_page(&self, page: Option<usize>) {
        *self.fail_on_page.lock().unwrap() = page;
    }

    pub fn break_detail(&self, instance_id: &str) {
        self.broken_details
            .lock()
            .unwrap()
            .insert(instance_id.to_string());
    }

    /// Pause the next fetch of `page`.  Returns `(reached, release)`.
    pub fn gate(&self, page: usize) -> (Arc<Notify>, Arc<Notify>) {
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Gate {
            page,
            reached: Arc::clone(&reached),
            release: Arc::clone(&release),
        });
        (reached, release)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InventorySource for ScriptedInventory {
    async fn list_instances_page(
        &self,
        _project_id: &str,
        page_token: Option<&str>,
    ) -> Result<InstancePage, InventoryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let page_no = match page_token {
            None => 1,
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| InventoryError::Fetch(format!("bad token {}", token)))?,
        };

        let gate = {
            let mut slot = self.gate.lock().unwrap();
            if slot.as_ref().map(|g| g.page) == Some(page_no) {
                slot.take().map(|g| (g.reached, g.release))
            } else {
                None
            }
        };
        if let Some((reached, release)) = gate {
            reached.notify_one();
            release.notified().await;
        }

        if *self.fail_on_page.lock().unwrap() == Some(page_no) {
            return Err(InventoryError::Fetch(format!("page {} unavailable", page_no)));
        }

        let pages = self.pages.lock().unwrap().clone();
        let mut page = InstancePage::default();
        if let Some(instances) = pages.get(page_no - 1) {
            for instance in instances {
                let scope = instance
                    .zone
                    .as_deref()
                    .map(|z| format!("zones/{}", gce_lookup::index::zone_from_url(z)))
                    .unwrap_or_else(|| "global".into());
                page.items
                    .entry(scope)
                    .or_default()
                    .instances
                    .push(instance.clone());
            }
        }
        if page_no < pages.len() {
            page.next_page_token = Some((page_no + 1).to_string());
        }
        Ok(page)
    }

    async fn get_instance(
        &self,
        _project_id: &str,
        instance_id: &str,
        zone: &str,
    ) -> Result<Instance, InventoryError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.broken_details.lock().unwrap().contains(instance_id) {
            return Err(InventoryError::Fetch(format!(
                "instances.get {} timed out",
                instance_id
            )));
        }
        self.live
            .lock()
            .unwrap()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| InventoryError::NotFound {
                instance_id: instance_id.into(),
                zone: zone.into(),
            })
    }
}
