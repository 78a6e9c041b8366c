//! gce-lookup daemon entry point.
//!
//! Reads whitespace-separated entity values from stdin, one batch per line,
//! and writes one JSON lookup result per line to stdout.

use std::sync::Arc;

use anyhow::anyhow;
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;

use gce_lookup::{Config, Entity, Integration, JsonFileInventory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let cfg = Config::load()?;

    // Initialize logging, RUST_LOG overrides the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cfg.log_level.as_str()),
    )
    .init();
    info!("Starting gce-lookup with config: {:?}", cfg);

    let errors = cfg.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("Invalid configuration: {}", e);
        }
        return Err(anyhow!("{} configuration error(s)", errors.len()));
    }
    let inventory_file = cfg
        .inventory_file
        .clone()
        .ok_or_else(|| anyhow!("inventory_file must be set"))?;

    let source = Arc::new(JsonFileInventory::new(inventory_file, cfg.page_size));
    let integration = Arc::new(Integration::new(source, cfg.project_id.clone()));

    // Initial fill before any lookup is served
    integration.startup().await;

    // Lookup loop
    let options = cfg.options();
    let classifier = cfg.classifier();
    let lookups = Arc::clone(&integration);
    let mut lookup_handle = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            };

            let mut entities: Vec<Entity> = Vec::new();
            for value in line.split_whitespace() {
                match classifier.classify(value) {
                    Some(entity) => entities.push(entity),
                    None => warn!("Ignoring unrecognised entity `{}`", value),
                }
            }
            if entities.is_empty() {
                continue;
            }

            let batch = lookups.do_lookup(&entities, &options).await;
            for result in &batch.results {
                match serde_json::to_string(result) {
                    Ok(json) => println!("{}", json),
                    Err(e) => error!("Failed to serialize result for {}: {}", result.entity, e),
                }
            }
        }
    });

    // Graceful Shutdown
    tokio::select! {
        res = signal::ctrl_c() => match res {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        },
        _ = &mut lookup_handle => info!("Input closed, shutting down..."),
    }

    lookup_handle.abort();
    integration.shutdown().await;

    info!("Shutdown complete.");
    Ok(())
}
