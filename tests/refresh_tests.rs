//! Refresh pass behaviour: coverage, idempotence and atomic swap.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{instance, web1, ScriptedInventory, PROJECT};
use gce_lookup::{Entity, Integration, InstanceRef, Options, RefreshError};

fn fleet() -> Vec<Vec<gce_lookup::Instance>> {
    vec![
        vec![
            web1(),
            instance("200", "db1", "us-east1-b", "10.0.1.10", None),
        ],
        vec![],
        vec![instance("300", "batch1", "europe-west1-c", "10.0.2.20", Some("34.9.9.9"))],
    ]
}

#[tokio::test]
async fn every_interface_and_nat_ip_resolves() {
    let inventory = ScriptedInventory::new(fleet());
    let integration = Integration::new(inventory.clone(), PROJECT);

    let report = integration.startup().await.expect("refresh succeeds");
    assert_eq!(report.pages, 3);
    assert_eq!(report.instances, 3);
    assert_eq!(report.ip_entries, 5);
    assert_eq!(inventory.list_calls(), 3);

    let index = integration.store().snapshot().await;
    for (ip, id, zone) in [
        ("10.0.0.5", "123", "us-central1-a"),
        ("35.1.2.3", "123", "us-central1-a"),
        ("10.0.1.10", "200", "us-east1-b"),
        ("10.0.2.20", "300", "europe-west1-c"),
        ("34.9.9.9", "300", "europe-west1-c"),
    ] {
        assert_eq!(index.lookup_ip(ip), Some(&InstanceRef::new(id, zone)), "{}", ip);
    }
}

#[tokio::test]
async fn hostname_and_zonal_dns_share_a_ref() {
    let inventory = ScriptedInventory::new(fleet());
    let integration = Integration::new(inventory, PROJECT);
    integration.startup().await.unwrap();

    let index = integration.store().snapshot().await;
    let by_hostname = index.lookup_host("web1.example.com").unwrap();
    let by_dns = index
        .lookup_host("web1.us-central1-a.c.proj1.internal")
        .unwrap();
    assert_eq!(by_hostname, by_dns);
    assert_eq!(by_dns, &InstanceRef::new("123", "us-central1-a"));

    // Instances without a hostname still get their zonal name.
    assert!(index
        .lookup_host("db1.us-east1-b.c.proj1.internal")
        .is_some());
    assert_eq!(index.host_count(), 4);
}

#[tokio::test]
async fn identical_inventory_gives_identical_indexes() {
    let inventory = ScriptedInventory::new(fleet());
    let integration = Integration::new(inventory, PROJECT);

    integration.refresher().run_full_refresh().await.unwrap();
    let first = integration.store().snapshot().await;
    integration.refresher().run_full_refresh().await.unwrap();
    let second = integration.store().snapshot().await;

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(*first, *second);
}

#[tokio::test]
async fn removed_instances_drop_out_on_refresh() {
    let inventory = ScriptedInventory::new(fleet());
    let integration = Integration::new(inventory.clone(), PROJECT);
    integration.startup().await.unwrap();

    inventory.set_pages(vec![vec![web1()]]);
    integration.refresher().run_full_refresh().await.unwrap();

    let index = integration.store().snapshot().await;
    assert!(index.lookup_ip("10.0.1.10").is_none());
    assert!(index.lookup_ip("10.0.0.5").is_some());
}

#[tokio::test]
async fn failed_pass_keeps_previous_index_visible() {
    let inventory = ScriptedInventory::new(vec![vec![web1()]]);
    let integration = Arc::new(Integration::new(inventory.clone(), PROJECT));
    integration.startup().await.unwrap();
    let before = integration.store().snapshot().await;

    // New inventory: page 1 indexes fine, page 2 stalls and then fails.
    inventory.set_pages(vec![
        vec![instance("900", "new1", "us-west1-a", "10.9.0.1", None)],
        vec![instance("901", "new2", "us-west1-a", "10.9.0.2", None)],
        vec![instance("902", "new3", "us-west1-a", "10.9.0.3", None)],
    ]);
    inventory.fail_on_page(Some(2));
    let (reached, release) = inventory.gate(2);

    let refresher = Arc::clone(integration.refresher());
    let pass = tokio::spawn(async move { refresher.run_full_refresh().await });
    reached.notified().await;

    // Mid-pass: lookups see the old index, not the partial new one.
    inventory.update_live(web1());
    let options = Options::default();
    let batch = integration
        .do_lookup(&[Entity::ip("10.0.0.5"), Entity::ip("10.9.0.1")], &options)
        .await;
    assert!(batch.errors.is_empty());
    let hits: HashSet<_> = batch
        .results
        .iter()
        .filter(|r| r.is_hit())
        .map(|r| r.entity.value.clone())
        .collect();
    assert_eq!(hits, HashSet::from(["10.0.0.5".to_string()]));

    release.notify_one();
    let err = pass.await.unwrap().unwrap_err();
    assert!(matches!(err, RefreshError::Inventory { page: 2, .. }));

    let after = integration.store().snapshot().await;
    assert!(Arc::ptr_eq(&before, &after));
    assert!(after.lookup_ip("10.9.0.1").is_none());
}

#[tokio::test]
async fn failed_startup_serves_misses() {
    let inventory = ScriptedInventory::new(fleet());
    inventory.fail_on_page(Some(1));
    let integration = Integration::new(inventory.clone(), PROJECT);

    assert!(integration.startup().await.is_none());
    assert!(integration.store().snapshot().await.is_empty());

    let batch = integration
        .do_lookup(&[Entity::ip("10.0.0.5")], &Options::default())
        .await;
    assert!(batch.errors.is_empty());
    assert_eq!(batch.results.len(), 1);
    assert!(!batch.results[0].is_hit());
    assert_eq!(inventory.get_calls(), 0);
}

#[tokio::test]
async fn empty_inventory_is_a_successful_pass() {
    let inventory = ScriptedInventory::new(vec![]);
    let integration = Integration::new(inventory.clone(), PROJECT);

    let report = integration.startup().await.unwrap();
    assert_eq!(report.pages, 1);
    assert_eq!(report.instances, 0);
    assert_eq!(inventory.list_calls(), 1);
}

#[tokio::test]
async fn scheduled_trigger_skips_while_a_pass_runs() {
    let inventory = ScriptedInventory::new(vec![vec![web1()]]);
    let integration = Integration::new(inventory.clone(), PROJECT);
    let (reached, release) = inventory.gate(1);

    let refresher = Arc::clone(integration.refresher());
    let pass = tokio::spawn(async move { refresher.run_full_refresh().await });
    reached.notified().await;

    for _ in 0..3 {
        assert!(integration.refresher().refresh_if_idle().await.is_none());
    }
    assert_eq!(inventory.list_calls(), 1);

    release.notify_one();
    pass.await.unwrap().unwrap();

    let report = integration.refresher().refresh_if_idle().await.unwrap();
    assert_eq!(report.instances, 1);
    assert_eq!(inventory.list_calls(), 2);
}
