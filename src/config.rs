// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use std::env;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Namespace holding the settings ConfigMap and Secret
    pub namespace: String,
    /// When true, no TLS certificate is generated during bootstrap
    pub insecure: bool,
    /// Pod hostname, used to derive the default admin password on first run
    pub hostname: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let namespace =
            env::var("POD_NAMESPACE").context("POD_NAMESPACE environment variable not set")?;
        let insecure: bool = env::var("INSECURE")
            .unwrap_or("false".to_string())
            .parse()
            .unwrap_or(false);
        // Set by the kubelet inside pods; fall back for off-cluster runs
        let hostname = env::var("HOSTNAME").unwrap_or("localhost".to_string());

        Ok(Config {
            namespace,
            insecure,
            hostname,
        })
    }
}
