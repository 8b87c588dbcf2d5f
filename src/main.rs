// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tokio::sync::mpsc;
use tracing::{info, warn};

use quartermaster::config::Config;
use quartermaster::settings::SettingsManager;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Quartermaster settings distributor");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: namespace={}", config.namespace);

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let secure = !config.insecure;
    let manager = SettingsManager::new(client, config);

    // One-time bootstrap: generate missing crypto material, migrate legacy
    // repository secrets, persist
    let settings = manager.initialize_settings(secure).await?;
    info!(
        "Settings initialized: sso_configured={} repositories={}",
        settings.is_sso_configured(),
        settings.repositories.len()
    );

    // Follow settings updates for the lifetime of the process
    let (tx, mut rx) = mpsc::channel(8);
    manager.subscribe(tx).await;
    while let Some(updated) = rx.recv().await {
        info!(
            "Settings updated: sso_configured={} repositories={} helm_repositories={}",
            updated.is_sso_configured(),
            updated.repositories.len(),
            updated.helm_repositories.len()
        );
    }

    warn!("Settings update stream ended unexpectedly");
    Ok(())
}
