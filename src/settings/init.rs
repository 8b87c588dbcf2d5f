// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! One-shot bootstrap: fills in missing cryptographic material and migrates
//! legacy per-repository secrets into the unified schema, then persists.
//! Every step is independent and idempotent; a second run regenerates
//! nothing.

use chrono::{Timelike, Utc};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::constants::{labels, SERVER_SIGNATURE_LEN};
use crate::error::{QuartermasterError, Result};
use crate::password;
use crate::settings::SettingsManager;
use crate::tls;
use crate::types::{RepoCredentials, SecretKeyRef, Settings};

impl SettingsManager {
    /// Initialize missing admin password, signing key and certificate, and
    /// persist the result. A write conflict means another replica got there
    /// first; the fresh state is re-read instead of erroring out.
    pub async fn initialize_settings(&self, secure: bool) -> Result<Settings> {
        let mut settings = match self.get_settings().await {
            Ok(settings) => settings,
            // expected on first run; proceed with the partial snapshot
            Err(QuartermasterError::IncompleteSettings { partial, .. }) => *partial,
            Err(e) => return Err(e),
        };

        ensure_crypto_material(
            &mut settings,
            secure,
            &self.config.hostname,
            self.namespace(),
        )?;

        if settings.repositories.is_empty() {
            settings.repositories = self.migrate_legacy_repo_secrets().await?;
        }

        match self.save_settings(&settings).await {
            Ok(()) => Ok(settings),
            Err(QuartermasterError::WriteConflict(_)) => {
                warn!("Conflict while initializing settings, assuming another replica completed it");
                self.get_settings().await
            }
            Err(e) => Err(e),
        }
    }

    /// Convert secrets tagged as legacy repository credentials into the
    /// unified schema, in listing order, never deduplicating by URL. Each
    /// located secret is rewritten in place to the current layout before
    /// the credential references it.
    pub(crate) async fn migrate_legacy_repo_secrets(&self) -> Result<Vec<RepoCredentials>> {
        let selector = format!("{}={}", labels::SECRET_TYPE, labels::SECRET_TYPE_REPOSITORY);
        let legacy = self.store.list_secrets(&selector).await?;
        if legacy.is_empty() {
            return Ok(Vec::new());
        }

        info!("Migrating {} legacy repository secrets", legacy.len());
        let mut repositories = Vec::with_capacity(legacy.len());
        for secret in legacy {
            self.store.update_secret(&secret).await?;
            repositories.push(legacy_secret_to_credentials(&secret));
        }
        Ok(repositories)
    }
}

/// Fill in any missing signing key, password hash, mtime and certificate.
/// Present material is never touched.
pub(crate) fn ensure_crypto_material(
    settings: &mut Settings,
    secure: bool,
    default_password: &str,
    namespace: &str,
) -> Result<()> {
    if settings.server_signature.is_empty() {
        let mut signature = vec![0u8; SERVER_SIGNATURE_LEN];
        OsRng.fill_bytes(&mut signature);
        settings.server_signature = signature;
        info!("Initialized server signature");
    }

    if settings.admin_password_hash.is_empty() {
        settings.admin_password_hash = password::hash_password(default_password)?;
        settings.admin_password_mtime = whole_second_now();
        info!("Initialized admin password");
    }
    if settings.admin_password_mtime.is_none() {
        // hash survived a prior partial run without its timestamp
        settings.admin_password_mtime = whole_second_now();
        info!("Initialized admin password mtime");
    }

    if settings.certificate.is_none() && secure {
        let hosts = tls::server_dns_names(namespace);
        settings.certificate = Some(tls::generate_self_signed(&hosts)?);
        info!("Initialized TLS certificate");
    }

    Ok(())
}

/// Stamps at the precision the secret stores, so a stamped snapshot and its
/// re-read compare equal
fn whole_second_now() -> Option<chrono::DateTime<Utc>> {
    Utc::now().with_nanosecond(0)
}

pub(crate) fn legacy_secret_to_credentials(secret: &Secret) -> RepoCredentials {
    let name = secret.name_any();
    let empty = BTreeMap::new();
    let data = secret.data.as_ref().unwrap_or(&empty);

    let mut cred = RepoCredentials {
        url: data
            .get("repository")
            .map(|v| String::from_utf8_lossy(&v.0).into_owned())
            .unwrap_or_default(),
        ..Default::default()
    };
    if non_empty(data, "username") {
        cred.username_secret = Some(SecretKeyRef {
            name: name.clone(),
            key: "username".to_string(),
        });
    }
    if non_empty(data, "password") {
        cred.password_secret = Some(SecretKeyRef {
            name: name.clone(),
            key: "password".to_string(),
        });
    }
    if non_empty(data, "sshPrivateKey") {
        cred.ssh_private_key_secret = Some(SecretKeyRef {
            name,
            key: "sshPrivateKey".to_string(),
        });
    }
    cred
}

fn non_empty(data: &BTreeMap<String, ByteString>, key: &str) -> bool {
    data.get(key).is_some_and(|v| !v.0.is_empty())
}
