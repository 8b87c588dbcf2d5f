// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Central settings manager: lazily established watch-backed caches, a
//! subscriber registry, and the read entrypoint.
//!
//! All cache-state transitions and the subscriber registry are serialized
//! by one mutex with short critical sections; snapshots are assembled and
//! delivered outside it, and channel sends never block.

pub mod assemble;
pub mod init;
pub mod persist;

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::constants::{config_keys, resources, DEFAULT_APP_INSTANCE_LABEL_KEY};
use crate::error::{QuartermasterError, Result};
use crate::store::CredentialStore;
use crate::types::{ConfigManagementPlugin, ResourceOverride, ResourcesFilter, Settings};
use crate::watch::{ChangeEvent, ChangeWatcher};

/// Cache lifecycle. Watches are not established until first access; a
/// forced resync re-enters `Initializing` even when already synced.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CachePhase {
    Uninitialized,
    Initializing,
    Synced,
}

struct ManagerState {
    phase: CachePhase,
    watcher: Option<ChangeWatcher>,
    subscribers: Vec<mpsc::Sender<Settings>>,
}

/// Process-scoped settings component. Cheap to share by reference; holds
/// no settings itself, only the watch-backed views they assemble from.
pub struct SettingsManager {
    client: Client,
    config: Config,
    store: CredentialStore,
    state: Arc<Mutex<ManagerState>>,
    change_tx: mpsc::Sender<ChangeEvent>,
}

impl SettingsManager {
    pub fn new(client: Client, config: Config) -> Self {
        let (change_tx, change_rx) = mpsc::channel(64);
        let state = Arc::new(Mutex::new(ManagerState {
            phase: CachePhase::Uninitialized,
            watcher: None,
            subscribers: Vec::new(),
        }));
        tokio::spawn(dispatch_changes(change_rx, Arc::clone(&state)));

        let store = CredentialStore::new(client.clone(), &config.namespace);
        Self {
            client,
            config,
            store,
            state,
            change_tx,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Retrieve the assembled settings snapshot from the cached views.
    /// On an incomplete store the returned error carries the best-effort
    /// snapshot; decode and certificate failures fail the read.
    pub async fn get_settings(&self) -> Result<Settings> {
        self.ensure_synced(false).await?;
        let (cm, secret) = self.current_views().await?;
        let (settings, issues) = assemble::assemble(&cm, &secret);
        match issues.first() {
            Some(issue) => Err(assemble::into_error(issue, &settings)),
            None => Ok(settings),
        }
    }

    /// Tear down any in-flight watch establishment and re-enter
    /// `Initializing`, guaranteeing the next read observes fresh state
    pub async fn resync_informers(&self) -> Result<()> {
        self.ensure_synced(true).await
    }

    /// Register a channel for settings updates
    pub async fn subscribe(&self, subscriber: mpsc::Sender<Settings>) {
        let mut state = self.state.lock().await;
        state.subscribers.push(subscriber);
        info!(
            "Subscribed to settings updates, {} registered",
            state.subscribers.len()
        );
    }

    /// Remove a previously registered channel, matched by identity.
    /// No-op when the channel was never registered.
    pub async fn unsubscribe(&self, subscriber: &mpsc::Sender<Settings>) {
        let mut state = self.state.lock().await;
        let before = state.subscribers.len();
        state.subscribers.retain(|s| !s.same_channel(subscriber));
        if state.subscribers.len() < before {
            info!("Unsubscribed from settings updates");
        }
    }

    /// Resource inclusion/exclusion filter rules from the config resource
    pub async fn get_resources_filter(&self) -> Result<ResourcesFilter> {
        let data = self.config_map_data().await?;
        let mut filter = ResourcesFilter::default();
        if let Some(raw) = data.get(config_keys::RESOURCE_INCLUSIONS) {
            filter.resource_inclusions = decode_value(raw, config_keys::RESOURCE_INCLUSIONS)?;
        }
        if let Some(raw) = data.get(config_keys::RESOURCE_EXCLUSIONS) {
            filter.resource_exclusions = decode_value(raw, config_keys::RESOURCE_EXCLUSIONS)?;
        }
        Ok(filter)
    }

    /// Label key injected into deployed workloads, with the built-in
    /// default when unset
    pub async fn get_app_instance_label_key(&self) -> Result<String> {
        let data = self.config_map_data().await?;
        match data.get(config_keys::APP_INSTANCE_LABEL_KEY) {
            Some(label) if !label.is_empty() => Ok(label.clone()),
            _ => Ok(DEFAULT_APP_INSTANCE_LABEL_KEY.to_string()),
        }
    }

    pub async fn get_config_management_plugins(&self) -> Result<Vec<ConfigManagementPlugin>> {
        let data = self.config_map_data().await?;
        match data.get(config_keys::CONFIG_MANAGEMENT_PLUGINS) {
            Some(raw) => decode_value(raw, config_keys::CONFIG_MANAGEMENT_PLUGINS),
            None => Ok(Vec::new()),
        }
    }

    pub async fn get_resource_overrides(&self) -> Result<BTreeMap<String, ResourceOverride>> {
        let data = self.config_map_data().await?;
        match data.get(config_keys::RESOURCE_CUSTOMIZATIONS) {
            Some(raw) => decode_value(raw, config_keys::RESOURCE_CUSTOMIZATIONS),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Serialized cache establishment. A caller arriving while another
    /// initialization is in flight blocks on the lock rather than starting
    /// a second one; a forced resync supersedes any existing watches.
    pub(crate) async fn ensure_synced(&self, force: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if !force && state.phase == CachePhase::Synced {
            return Ok(());
        }

        state.phase = CachePhase::Initializing;
        if let Some(old) = state.watcher.take() {
            // abandoned, not awaited
            old.abort();
        }

        let watcher = ChangeWatcher::start(&self.client, &self.config.namespace, self.change_tx.clone());
        match watcher.wait_until_ready().await {
            Ok(()) => {
                state.watcher = Some(watcher);
                state.phase = CachePhase::Synced;
                info!("Configmap/secret caches synced");
                Ok(())
            }
            Err(e) => {
                state.phase = CachePhase::Uninitialized;
                Err(e)
            }
        }
    }

    pub(crate) async fn current_views(&self) -> Result<(ConfigMap, Secret)> {
        let state = self.state.lock().await;
        let watcher = state.watcher.as_ref().ok_or_else(|| {
            QuartermasterError::StoreUnavailable("settings caches not initialized".to_string())
        })?;
        let cm = watcher.config_map().ok_or_else(|| {
            QuartermasterError::StoreUnavailable(format!(
                "ConfigMap {} not found",
                resources::CONFIG_MAP_NAME
            ))
        })?;
        let secret = watcher.secret().ok_or_else(|| {
            QuartermasterError::StoreUnavailable(format!(
                "Secret {} not found",
                resources::SECRET_NAME
            ))
        })?;
        Ok((cm, secret))
    }

    /// Cached views as options, for write paths that create-if-absent
    pub(crate) async fn cached_resources(&self) -> (Option<ConfigMap>, Option<Secret>) {
        let state = self.state.lock().await;
        match state.watcher.as_ref() {
            Some(watcher) => (watcher.config_map(), watcher.secret()),
            None => (None, None),
        }
    }

    async fn config_map_data(&self) -> Result<BTreeMap<String, String>> {
        self.ensure_synced(false).await?;
        let (cm, _) = self.current_views().await?;
        Ok(cm.data.unwrap_or_default())
    }
}

fn decode_value<T: DeserializeOwned>(raw: &str, key: &'static str) -> Result<T> {
    serde_yaml::from_str(raw).map_err(|e| QuartermasterError::DecodeError {
        key,
        message: e.to_string(),
    })
}

/// Background delivery loop: on every confirmed resource change, rebuild
/// the snapshot and fan it out to the registered subscribers. Assembly
/// failures are logged and the notification dropped.
async fn dispatch_changes(
    mut change_rx: mpsc::Receiver<ChangeEvent>,
    state: Arc<Mutex<ManagerState>>,
) {
    while let Some(event) = change_rx.recv().await {
        debug!("Handling change event: {:?}", event);
        // snapshot the views under the lock, assemble and deliver without it
        let (cm, secret) = {
            let guard = state.lock().await;
            let Some(watcher) = guard.watcher.as_ref() else {
                continue;
            };
            match (watcher.config_map(), watcher.secret()) {
                (Some(cm), Some(secret)) => (cm, secret),
                _ => {
                    warn!("Settings resources missing from cache, skipping notification");
                    continue;
                }
            }
        };
        let (settings, issues) = assemble::assemble(&cm, &secret);
        if let Some(issue) = issues.first() {
            warn!(
                "Unable to assemble updated settings: {}",
                assemble::into_error(issue, &settings)
            );
            continue;
        }
        let subscribers = state.lock().await.subscribers.clone();
        deliver_to_subscribers(&subscribers, &settings);
    }
}

/// Push a snapshot to every registered subscriber. Sends never block; a
/// stalled consumer loses the update and is warned about.
fn deliver_to_subscribers(subscribers: &[mpsc::Sender<Settings>], settings: &Settings) {
    if subscribers.is_empty() {
        return;
    }
    info!("Notifying {} settings subscribers", subscribers.len());
    for subscriber in subscribers {
        if subscriber.try_send(settings.clone()).is_err() {
            warn!("Dropping settings update for a stalled subscriber");
        }
    }
}
