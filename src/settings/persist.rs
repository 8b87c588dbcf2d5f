// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Writing a settings snapshot back into the backing resources.
//!
//! Keys owned by the persister are set or cleared based on whether the
//! corresponding snapshot field is present, so unset fields never leave
//! stale fragments behind. Secret keys the persister does not own are left
//! untouched, preserving operator-added custom entries.

use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::constants::{config_keys, resources, secret_keys};
use crate::error::{QuartermasterError, Result};
use crate::settings::SettingsManager;
use crate::types::Settings;

impl SettingsManager {
    /// Upsert the snapshot into the ConfigMap and Secret, then force a
    /// resync so the next read observes the just-written values. Write
    /// conflicts surface to the caller; nothing is retried here.
    pub async fn save_settings(&self, settings: &Settings) -> Result<()> {
        self.ensure_synced(false).await?;
        let (cached_cm, cached_secret) = self.cached_resources().await;

        let (mut cm, create_cm) = match cached_cm {
            Some(cm) => (cm, false),
            None => (
                ConfigMap {
                    metadata: ObjectMeta {
                        name: Some(resources::CONFIG_MAP_NAME.to_string()),
                        namespace: Some(self.namespace().to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                true,
            ),
        };
        apply_to_config_data(cm.data.get_or_insert_with(BTreeMap::new), settings)?;
        if create_cm {
            self.store.create_config_map(&cm).await?;
        } else {
            self.store.update_config_map(&cm).await?;
        }

        let (mut secret, create_secret) = match cached_secret {
            Some(secret) => (secret, false),
            None => (
                Secret {
                    metadata: ObjectMeta {
                        name: Some(resources::SECRET_NAME.to_string()),
                        namespace: Some(self.namespace().to_string()),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                true,
            ),
        };
        apply_to_secret_data(secret.data.get_or_insert_with(BTreeMap::new), settings);
        if create_secret {
            self.store.create_secret(&secret).await?;
        } else {
            self.store.update_secret(&secret).await?;
        }

        info!("Settings saved, resyncing caches");
        self.resync_informers().await
    }
}

/// Apply snapshot fields to the ConfigMap data, clearing keys whose fields
/// are unset
pub(crate) fn apply_to_config_data(
    data: &mut BTreeMap<String, String>,
    settings: &Settings,
) -> Result<()> {
    set_or_clear(data, config_keys::URL, &settings.url);
    // cleared by key, not by stored value
    set_or_clear(data, config_keys::DEX_CONFIG, &settings.dex_config);
    set_or_clear(data, config_keys::OIDC_CONFIG, &settings.oidc_config_raw);
    set_or_clear_list(data, config_keys::REPOSITORIES, &settings.repositories)?;
    set_or_clear_list(
        data,
        config_keys::REPOSITORY_CREDENTIALS,
        &settings.repository_credentials,
    )?;
    set_or_clear_list(
        data,
        config_keys::HELM_REPOSITORIES,
        &settings.helm_repositories,
    )?;
    Ok(())
}

/// Apply snapshot fields to the Secret data. Mandatory material is always
/// written; certificate keys are written together or removed together;
/// unknown keys are never deleted.
pub(crate) fn apply_to_secret_data(data: &mut BTreeMap<String, ByteString>, settings: &Settings) {
    data.insert(
        secret_keys::SERVER_SIGNATURE.to_string(),
        ByteString(settings.server_signature.clone()),
    );
    data.insert(
        secret_keys::ADMIN_PASSWORD.to_string(),
        ByteString(settings.admin_password_hash.clone().into_bytes()),
    );
    match settings.admin_password_mtime {
        Some(mtime) => {
            data.insert(
                secret_keys::ADMIN_PASSWORD_MTIME.to_string(),
                ByteString(
                    mtime
                        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
                        .into_bytes(),
                ),
            );
        }
        None => {
            data.remove(secret_keys::ADMIN_PASSWORD_MTIME);
        }
    }

    if !settings.webhook_github_secret.is_empty() {
        data.insert(
            secret_keys::WEBHOOK_GITHUB_SECRET.to_string(),
            ByteString(settings.webhook_github_secret.clone().into_bytes()),
        );
    }
    if !settings.webhook_gitlab_secret.is_empty() {
        data.insert(
            secret_keys::WEBHOOK_GITLAB_SECRET.to_string(),
            ByteString(settings.webhook_gitlab_secret.clone().into_bytes()),
        );
    }
    if !settings.webhook_bitbucket_uuid.is_empty() {
        data.insert(
            secret_keys::WEBHOOK_BITBUCKET_UUID.to_string(),
            ByteString(settings.webhook_bitbucket_uuid.clone().into_bytes()),
        );
    }

    match &settings.certificate {
        Some(cert) => {
            data.insert(
                secret_keys::TLS_CERT.to_string(),
                ByteString(cert.cert_pem.clone().into_bytes()),
            );
            data.insert(
                secret_keys::TLS_KEY.to_string(),
                ByteString(cert.key_pem.clone().into_bytes()),
            );
        }
        None => {
            data.remove(secret_keys::TLS_CERT);
            data.remove(secret_keys::TLS_KEY);
        }
    }
}

fn set_or_clear(data: &mut BTreeMap<String, String>, key: &str, value: &str) {
    if value.is_empty() {
        data.remove(key);
    } else {
        data.insert(key.to_string(), value.to_string());
    }
}

fn set_or_clear_list<T: Serialize>(
    data: &mut BTreeMap<String, String>,
    key: &'static str,
    list: &[T],
) -> Result<()> {
    if list.is_empty() {
        data.remove(key);
        return Ok(());
    }
    let yaml = serde_yaml::to_string(list).map_err(|e| QuartermasterError::DecodeError {
        key,
        message: e.to_string(),
    })?;
    data.insert(key.to_string(), yaml);
    Ok(())
}
