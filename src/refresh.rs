//! Full cache refresh: enumerate, index into a fresh table, swap.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info};
use serde::Serialize;
use sysinfo::System;
use tokio::sync::Mutex;

use crate::error::RefreshError;
use crate::index::{CacheIndex, IndexStore};
use crate::inventory::InventorySource;
use crate::pagination;

/// Statistics for one successful refresh pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub duration: Duration,
    pub pages: usize,
    pub instances: usize,
    pub ip_entries: usize,
    pub host_entries: usize,
    /// Resident memory of this process after the swap, when available.
    pub memory_bytes: Option<u64>,
}

pub struct Refresher {
    source: Arc<dyn InventorySource>,
    store: Arc<IndexStore>,
    project_id: String,
    // Serialises passes so the store only ever has one writer.
    pass: Mutex<()>,
}

impl Refresher {
    pub fn new(
        source: Arc<dyn InventorySource>,
        store: Arc<IndexStore>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            store,
            project_id: project_id.into(),
            pass: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<IndexStore> {
        &self.store
    }

    /// Run one complete pass.  On error the live index is left as it was.
    pub async fn run_full_refresh(&self) -> Result<RefreshReport, RefreshError> {
        let _pass = self.pass.lock().await;
        self.run_pass().await
    }

    async fn run_pass(&self) -> Result<RefreshReport, RefreshError> {
        let started = Instant::now();

        let mut next = CacheIndex::new();
        let mut instances = 0;
        let project_id = self.project_id.as_str();
        let summary = pagination::enumerate_all(self.source.as_ref(), project_id, |batch| {
            instances += batch.len();
            for instance in &batch {
                next.index(instance, project_id);
            }
        })
        .await?;

        let ip_entries = next.ip_count();
        let host_entries = next.host_count();
        self.store.replace(next).await;

        let report = RefreshReport {
            duration: started.elapsed(),
            pages: summary.pages,
            instances,
            ip_entries,
            host_entries,
            memory_bytes: resident_memory(),
        };
        info!(
            "Initialized instance cache: {} IPs, {} hostnames from {} instances over {} page(s) in {:?} (rss: {})",
            report.ip_entries,
            report.host_entries,
            report.instances,
            report.pages,
            report.duration,
            report
                .memory_bytes
                .map(|b| format!("{} MB", b / (1024 * 1024)))
                .unwrap_or_else(|| "unknown".to_string())
        );
        Ok(report)
    }

    /// Run a pass, logging a failure instead of returning it.
    pub async fn refresh_logged(&self) -> Option<RefreshReport> {
        match self.run_full_refresh().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Error refreshing instance cache: {}", e.report());
                None
            }
        }
    }

    /// Like [`refresh_logged`](Self::refresh_logged), but returns at once
    /// without refreshing when another pass holds the store.
    pub async fn refresh_if_idle(&self) -> Option<RefreshReport> {
        let Ok(_pass) = self.pass.try_lock() else {
            debug!("Instance cache refresh already running, skipping this trigger");
            return None;
        };
        match self.run_pass().await {
            Ok(report) => Some(report),
            Err(e) => {
                error!("Error refreshing instance cache: {}", e.report());
                None
            }
        }
    }
}

fn resident_memory() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = System::new();
    system.refresh_process(pid);
    system.process(pid).map(|p| p.memory())
}
