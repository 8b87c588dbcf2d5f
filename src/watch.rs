// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Live watches over the backing ConfigMap and Secret.
//!
//! Watches are reflector-backed; the stores double as the read views for
//! settings assembly. A change event fires only when an object's resource
//! version actually moved, not on every watch tick: the initial listing
//! primes the version table silently, and re-lists after a watch restart
//! only fire for objects whose version changed while disconnected.

use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::runtime::reflector::{self, ObjectRef};
use kube::runtime::WatchStreamExt;
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::watcher::{self, watcher, Event};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants::{resources, SYNC_TIMEOUT_SECS};
use crate::error::{QuartermasterError, Result};

/// Raised when a watched resource's content actually changed
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    ConfigMapChanged { name: String },
    SecretChanged { name: String },
}

pub struct ChangeWatcher {
    namespace: String,
    config_maps: reflector::Store<ConfigMap>,
    secrets: reflector::Store<Secret>,
    tasks: Vec<JoinHandle<()>>,
}

impl ChangeWatcher {
    /// Establish both watches as background tasks. Callers must await
    /// `wait_until_ready` before reading the views.
    pub fn start(client: &Client, namespace: &str, events: mpsc::Sender<ChangeEvent>) -> Self {
        info!("Starting configmap/secret watches in {}", namespace);

        let cm_api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
        let cm_config = watcher::Config::default()
            .fields(&format!("metadata.name={}", resources::CONFIG_MAP_NAME));
        let (cm_reader, cm_writer) = reflector::store();
        let cm_stream = reflector::reflector(cm_writer, watcher(cm_api, cm_config).default_backoff());
        let cm_events = events.clone();
        let cm_task = tokio::spawn(run_watch(cm_stream, cm_events, |name| {
            ChangeEvent::ConfigMapChanged { name }
        }));

        let secret_api: Api<Secret> = Api::namespaced(client.clone(), namespace);
        let (secret_reader, secret_writer) = reflector::store();
        let secret_stream = reflector::reflector(
            secret_writer,
            watcher(secret_api, watcher::Config::default()).default_backoff(),
        );
        let secret_task = tokio::spawn(run_watch(secret_stream, events, |name| {
            ChangeEvent::SecretChanged { name }
        }));

        Self {
            namespace: namespace.to_string(),
            config_maps: cm_reader,
            secrets: secret_reader,
            tasks: vec![cm_task, secret_task],
        }
    }

    /// Block until both watches report their initial sync, bounded by
    /// `SYNC_TIMEOUT_SECS`
    pub async fn wait_until_ready(&self) -> Result<()> {
        let ready = async {
            self.config_maps
                .wait_until_ready()
                .await
                .map_err(|_| QuartermasterError::StoreUnavailable("configmap watch stopped".into()))?;
            self.secrets
                .wait_until_ready()
                .await
                .map_err(|_| QuartermasterError::StoreUnavailable("secret watch stopped".into()))?;
            Ok(())
        };
        tokio::time::timeout(Duration::from_secs(SYNC_TIMEOUT_SECS), ready)
            .await
            .map_err(|_| QuartermasterError::SyncTimeout)?
    }

    /// Current view of the settings ConfigMap
    pub fn config_map(&self) -> Option<ConfigMap> {
        self.config_maps
            .get(&ObjectRef::new(resources::CONFIG_MAP_NAME).within(&self.namespace))
            .map(|cm| (*cm).clone())
    }

    /// Current view of the settings Secret
    pub fn secret(&self) -> Option<Secret> {
        self.secrets
            .get(&ObjectRef::new(resources::SECRET_NAME).within(&self.namespace))
            .map(|secret| (*secret).clone())
    }

    /// Abandon the background watch tasks without waiting on them
    pub fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.abort();
    }
}

async fn run_watch<K, S>(
    stream: S,
    events: mpsc::Sender<ChangeEvent>,
    make_event: impl Fn(String) -> ChangeEvent,
) where
    K: Resource<DynamicType = ()> + Clone,
    S: Stream<Item = watcher::Result<Event<K>>>,
{
    let mut versions: HashMap<String, String> = HashMap::new();
    futures::pin_mut!(stream);

    while let Some(item) = stream.next().await {
        let fired = match item {
            Ok(Event::InitApply(obj)) => prime_version(&mut versions, &obj),
            Ok(Event::Apply(obj)) => apply_version(&mut versions, &obj),
            Ok(Event::Delete(obj)) => versions.remove(&obj.name_any()).map(|_| obj.name_any()),
            Ok(Event::Init) | Ok(Event::InitDone) => None,
            Err(e) => {
                warn!("Watch error: {}", e);
                None
            }
        };
        if let Some(name) = fired {
            debug!("Resource {} changed", name);
            if events.send(make_event(name)).await.is_err() {
                // manager gone, stop watching
                return;
            }
        }
    }
}

/// Record a version seen during (re-)listing. Fires only when a previously
/// known object re-lists with a different version.
fn prime_version<K: Resource<DynamicType = ()>>(
    versions: &mut HashMap<String, String>,
    obj: &K,
) -> Option<String> {
    let name = obj.name_any();
    let version = obj.resource_version().unwrap_or_default();
    match versions.insert(name.clone(), version.clone()) {
        Some(prev) if prev != version => Some(name),
        _ => None,
    }
}

/// Record a watch-applied version. Fires for new objects and version moves.
fn apply_version<K: Resource<DynamicType = ()>>(
    versions: &mut HashMap<String, String>,
    obj: &K,
) -> Option<String> {
    let name = obj.name_any();
    let version = obj.resource_version().unwrap_or_default();
    if versions.insert(name.clone(), version.clone()) == Some(version) {
        None
    } else {
        Some(name)
    }
}
