// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pure decode/merge of the backing resources into a settings snapshot.
//!
//! Assembly is best-effort: a failure on one field is collected and the
//! rest of the snapshot still assembles, so partial configuration is never
//! silently lost.

use chrono::{DateTime, Timelike, Utc};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::ByteString;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::constants::{config_keys, secret_keys};
use crate::error::QuartermasterError;
use crate::tls;
use crate::types::{Settings, TlsCertificate};

/// One collected assembly failure. Converted into a `QuartermasterError`
/// only for the first entry; the snapshot accompanies it either way.
#[derive(Debug)]
pub(crate) enum AssembleError {
    MissingKey(&'static str),
    Decode { key: &'static str, message: String },
    Certificate(String),
}

pub(crate) fn into_error(issue: &AssembleError, partial: &Settings) -> QuartermasterError {
    match issue {
        AssembleError::MissingKey(key) => QuartermasterError::IncompleteSettings {
            missing: key.to_string(),
            partial: Box::new(partial.clone()),
        },
        AssembleError::Decode { key, message } => QuartermasterError::DecodeError {
            key,
            message: message.clone(),
        },
        AssembleError::Certificate(message) => {
            QuartermasterError::CertificateError(message.clone())
        }
    }
}

/// Assemble a snapshot from the two resources' current contents
pub(crate) fn assemble(cm: &ConfigMap, secret: &Secret) -> (Settings, Vec<AssembleError>) {
    let mut settings = Settings::default();
    let mut issues = Vec::new();
    apply_config_map(&mut settings, cm, &mut issues);
    apply_secret(&mut settings, secret, &mut issues);
    (settings, issues)
}

fn apply_config_map(settings: &mut Settings, cm: &ConfigMap, issues: &mut Vec<AssembleError>) {
    let empty = BTreeMap::new();
    let data = cm.data.as_ref().unwrap_or(&empty);

    settings.url = data.get(config_keys::URL).cloned().unwrap_or_default();
    settings.dex_config = data
        .get(config_keys::DEX_CONFIG)
        .cloned()
        .unwrap_or_default();
    settings.oidc_config_raw = data
        .get(config_keys::OIDC_CONFIG)
        .cloned()
        .unwrap_or_default();

    if let Some(repositories) = decode_yaml_list(data, config_keys::REPOSITORIES, issues) {
        settings.repositories = repositories;
    }
    if let Some(templates) = decode_yaml_list(data, config_keys::REPOSITORY_CREDENTIALS, issues) {
        settings.repository_credentials = templates;
    }
    if let Some(helm) = decode_yaml_list(data, config_keys::HELM_REPOSITORIES, issues) {
        settings.helm_repositories = helm;
    }
}

/// Decode a YAML-encoded list value when the key is present, collecting a
/// decode failure without stopping the other keys
fn decode_yaml_list<T: DeserializeOwned>(
    data: &BTreeMap<String, String>,
    key: &'static str,
    issues: &mut Vec<AssembleError>,
) -> Option<Vec<T>> {
    let raw = data.get(key)?;
    if raw.is_empty() {
        return None;
    }
    match serde_yaml::from_str(raw) {
        Ok(list) => Some(list),
        Err(e) => {
            issues.push(AssembleError::Decode {
                key,
                message: e.to_string(),
            });
            None
        }
    }
}

fn apply_secret(settings: &mut Settings, secret: &Secret, issues: &mut Vec<AssembleError>) {
    let empty = BTreeMap::new();
    let data = secret.data.as_ref().unwrap_or(&empty);

    match data.get(secret_keys::ADMIN_PASSWORD) {
        Some(hash) => settings.admin_password_hash = lossy(hash),
        None => issues.push(AssembleError::MissingKey(secret_keys::ADMIN_PASSWORD)),
    }
    if let Some(mtime) = data.get(secret_keys::ADMIN_PASSWORD_MTIME) {
        // malformed timestamps are ignored, not collected; sub-second
        // precision is dropped to match what persisting writes back
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&lossy(mtime)) {
            settings.admin_password_mtime = parsed.with_timezone(&Utc).with_nanosecond(0);
        }
    }
    match data.get(secret_keys::SERVER_SIGNATURE) {
        Some(signature) => settings.server_signature = signature.0.clone(),
        None => issues.push(AssembleError::MissingKey(secret_keys::SERVER_SIGNATURE)),
    }

    if let Some(v) = data.get(secret_keys::WEBHOOK_GITHUB_SECRET) {
        if !v.0.is_empty() {
            settings.webhook_github_secret = lossy(v);
        }
    }
    if let Some(v) = data.get(secret_keys::WEBHOOK_GITLAB_SECRET) {
        if !v.0.is_empty() {
            settings.webhook_gitlab_secret = lossy(v);
        }
    }
    if let Some(v) = data.get(secret_keys::WEBHOOK_BITBUCKET_UUID) {
        if !v.0.is_empty() {
            settings.webhook_bitbucket_uuid = lossy(v);
        }
    }

    match (
        data.get(secret_keys::TLS_CERT),
        data.get(secret_keys::TLS_KEY),
    ) {
        (Some(cert), Some(key)) => {
            let cert_pem = lossy(cert);
            let key_pem = lossy(key);
            match tls::validate_key_pair(&cert_pem, &key_pem) {
                Ok(()) => settings.certificate = Some(TlsCertificate { cert_pem, key_pem }),
                Err(e) => issues.push(AssembleError::Certificate(format!(
                    "invalid x509 key pair {}/{} in secret: {}",
                    secret_keys::TLS_CERT,
                    secret_keys::TLS_KEY,
                    e
                ))),
            }
        }
        (Some(_), None) => issues.push(AssembleError::Certificate(format!(
            "{} is set but {} is missing",
            secret_keys::TLS_CERT,
            secret_keys::TLS_KEY
        ))),
        (None, Some(_)) => issues.push(AssembleError::Certificate(format!(
            "{} is set but {} is missing",
            secret_keys::TLS_KEY,
            secret_keys::TLS_CERT
        ))),
        (None, None) => {}
    }

    // every key is mirrored verbatim so operator-added secrets are never lost
    for (key, value) in data {
        settings.secrets.insert(key.clone(), lossy(value));
    }
}

fn lossy(value: &ByteString) -> String {
    String::from_utf8_lossy(&value.0).into_owned()
}
