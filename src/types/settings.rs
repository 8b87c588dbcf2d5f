// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! The in-memory settings snapshot assembled from the backing ConfigMap and
//! Secret, plus the SSO parameters derived from it on demand.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::warn;

use crate::constants::sso;

/// Runtime settings snapshot. Never mutated in place by consumers: every
/// write path clones the latest snapshot, applies changes and persists the
/// whole copy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    /// Externally facing URL users visit. Used when configuring SSO;
    /// omitting it disables SSO.
    pub url: String,
    /// Admin superuser password hash
    pub admin_password_hash: String,
    /// When the admin password was last changed
    pub admin_password_mtime: Option<DateTime<Utc>>,
    /// Portions of a Dex config yaml for the embedded identity broker
    pub dex_config: String,
    /// OIDC configuration as a raw string
    pub oidc_config_raw: String,
    /// Key used to sign session tokens
    pub server_signature: Vec<u8>,
    /// Certificate and private key for the API server. None runs insecure.
    pub certificate: Option<TlsCertificate>,
    /// Shared secret for authenticating GitHub webhook events
    pub webhook_github_secret: String,
    /// Shared secret for authenticating GitLab webhook events
    pub webhook_gitlab_secret: String,
    /// UUID for authenticating Bitbucket webhook events
    pub webhook_bitbucket_uuid: String,
    /// Every key/value in the backing Secret, as opaque strings. A read-time
    /// projection only; never written back wholesale.
    pub secrets: BTreeMap<String, String>,
    /// Configured repositories, in order. First URL match wins.
    pub repositories: Vec<RepoCredentials>,
    /// Repository credential templates, in order
    pub repository_credentials: Vec<RepoCredentials>,
    /// Configured Helm repositories, in order
    pub helm_repositories: Vec<HelmRepoCredentials>,
}

/// PEM-encoded certificate and private key pair
#[derive(Debug, Clone, PartialEq)]
pub struct TlsCertificate {
    pub cert_pem: String,
    pub key_pem: String,
}

/// Reference to a single key inside a named Secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretKeyRef {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoCredentials {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_secret: Option<SecretKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret: Option<SecretKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_private_key_secret: Option<SecretKeyRef>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub insecure_ignore_host_key: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRepoCredentials {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_secret: Option<SecretKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_secret: Option<SecretKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_secret: Option<SecretKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_secret: Option<SecretKeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_secret: Option<SecretKeyRef>,
}

/// OIDC parameters decoded on demand from the raw blob. Never persisted in
/// decoded form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OidcConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default, rename = "clientID")]
    pub client_id: String,
    #[serde(default, rename = "clientSecret")]
    pub client_secret: String,
    #[serde(default, rename = "cliClientID")]
    pub cli_client_id: String,
    #[serde(default, rename = "requestedScopes")]
    pub requested_scopes: Vec<String>,
}

impl Settings {
    /// Whether single-sign-on is configured, through either the embedded
    /// broker or a generic OIDC provider
    pub fn is_sso_configured(&self) -> bool {
        self.is_dex_configured() || self.oidc_config().is_some()
    }

    pub fn is_dex_configured(&self) -> bool {
        if self.url.is_empty() || self.dex_config.trim().is_empty() {
            return false;
        }
        match serde_yaml::from_str::<serde_yaml::Mapping>(&self.dex_config) {
            Ok(cfg) => !cfg.is_empty(),
            Err(_) => {
                warn!("invalid dex yaml config");
                false
            }
        }
    }

    /// Decode the OIDC blob, resolving the client secret against the generic
    /// secret map
    pub fn oidc_config(&self) -> Option<OidcConfig> {
        if self.oidc_config_raw.is_empty() {
            return None;
        }
        match serde_yaml::from_str::<OidcConfig>(&self.oidc_config_raw) {
            Ok(mut cfg) => {
                cfg.client_secret = resolve_secret_reference(&cfg.client_secret, &self.secrets);
                Some(cfg)
            }
            Err(e) => {
                warn!("invalid oidc config: {}", e);
                None
            }
        }
    }

    pub fn issuer_url(&self) -> String {
        if let Some(oidc) = self.oidc_config() {
            return oidc.issuer;
        }
        if !self.dex_config.is_empty() {
            return format!("{}{}", self.url, sso::DEX_API_ENDPOINT);
        }
        String::new()
    }

    pub fn oauth2_client_id(&self) -> String {
        if let Some(oidc) = self.oidc_config() {
            return oidc.client_id;
        }
        if !self.dex_config.is_empty() {
            return sso::CLIENT_APP_ID.to_string();
        }
        String::new()
    }

    pub fn oauth2_client_secret(&self) -> String {
        if let Some(oidc) = self.oidc_config() {
            return oidc.client_secret;
        }
        if !self.dex_config.is_empty() {
            return self.dex_oauth2_client_secret();
        }
        String::new()
    }

    pub fn redirect_url(&self) -> String {
        format!("{}{}", self.url, sso::CALLBACK_ENDPOINT)
    }

    /// Arbitrary but predictable OAuth2 client secret derived from the
    /// signing key, so the broker wrapper and the API server independently
    /// agree on the shared value without storing it anywhere.
    pub fn dex_oauth2_client_secret(&self) -> String {
        let sha = Sha256::digest(&self.server_signature);
        URL_SAFE.encode(sha)[..40].to_string()
    }
}

/// Resolve a sentinel-prefixed secret reference (`$key`) against the generic
/// secret map. Unresolvable references return the input unchanged.
pub fn resolve_secret_reference(val: &str, secrets: &BTreeMap<String, String>) -> String {
    let Some(key) = val.strip_prefix('$') else {
        return val.to_string();
    };
    match secrets.get(key) {
        Some(resolved) => resolved.clone(),
        None => {
            warn!(
                "config referenced '{}', but key does not exist in secret",
                val
            );
            val.to_string()
        }
    }
}
