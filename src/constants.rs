// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

/// Names of the two cluster-resident resources that back all settings
pub mod resources {
    /// ConfigMap holding non-secret settings
    pub const CONFIG_MAP_NAME: &str = "quartermaster-cm";
    /// Secret holding sensitive byte values
    pub const SECRET_NAME: &str = "quartermaster-secret";
}

/// String keys inside the backing ConfigMap
pub mod config_keys {
    /// Externally facing base URL
    pub const URL: &str = "url";
    /// Raw YAML config for the embedded Dex identity broker
    pub const DEX_CONFIG: &str = "dex.config";
    /// Raw YAML config for a generic OIDC provider
    pub const OIDC_CONFIG: &str = "oidc.config";
    /// YAML list of repository credentials
    pub const REPOSITORIES: &str = "repositories";
    /// YAML list of repository credential templates
    pub const REPOSITORY_CREDENTIALS: &str = "repository.credentials";
    /// YAML list of Helm repository credentials
    pub const HELM_REPOSITORIES: &str = "helm.repositories";
    /// YAML map of per-kind resource overrides
    pub const RESOURCE_CUSTOMIZATIONS: &str = "resource.customizations";
    /// YAML list of excluded resources
    pub const RESOURCE_EXCLUSIONS: &str = "resource.exclusions";
    /// YAML list of explicitly included resources
    pub const RESOURCE_INCLUSIONS: &str = "resource.inclusions";
    /// Override for the injected application instance label key
    pub const APP_INSTANCE_LABEL_KEY: &str = "application.instanceLabelKey";
    /// YAML list of config management plugin definitions
    pub const CONFIG_MANAGEMENT_PLUGINS: &str = "configManagementPlugins";
}

/// String keys inside the backing Secret
pub mod secret_keys {
    /// Admin password hash (mandatory)
    pub const ADMIN_PASSWORD: &str = "admin.password";
    /// RFC3339 timestamp of the last admin password change
    pub const ADMIN_PASSWORD_MTIME: &str = "admin.passwordMtime";
    /// Signing key used to derive session tokens (mandatory)
    pub const SERVER_SIGNATURE: &str = "server.secretkey";
    /// TLS certificate, PEM encoded
    pub const TLS_CERT: &str = "tls.crt";
    /// TLS private key, PEM encoded
    pub const TLS_KEY: &str = "tls.key";
    /// Shared secret for authenticating GitHub webhook events
    pub const WEBHOOK_GITHUB_SECRET: &str = "webhook.github.secret";
    /// Shared secret for authenticating GitLab webhook events
    pub const WEBHOOK_GITLAB_SECRET: &str = "webhook.gitlab.secret";
    /// UUID for authenticating Bitbucket webhook events
    pub const WEBHOOK_BITBUCKET_UUID: &str = "webhook.bitbucket.uuid";
}

/// Labels used to discover legacy per-repository credential secrets
pub mod labels {
    pub const SECRET_TYPE: &str = "quartermaster.io/secret-type";
    pub const SECRET_TYPE_REPOSITORY: &str = "repository";
}

/// Default label key injected into deployed workloads when no override is set
pub const DEFAULT_APP_INSTANCE_LABEL_KEY: &str = "app.kubernetes.io/instance";

/// Length in bytes of the generated session-token signing key
pub const SERVER_SIGNATURE_LEN: usize = 32;

/// Bounded wait for the initial watch sync before a read fails
pub const SYNC_TIMEOUT_SECS: u64 = 60;

/// OAuth2 endpoints relative to the external base URL
pub mod sso {
    /// Path under which the embedded Dex broker is served
    pub const DEX_API_ENDPOINT: &str = "/api/dex";
    /// OAuth2 callback path
    pub const CALLBACK_ENDPOINT: &str = "/auth/callback";
    /// OAuth2 client id used when the embedded broker handles SSO
    pub const CLIENT_APP_ID: &str = "quartermaster";
}

/// In-cluster service name covered by the generated TLS certificate
pub const SERVER_SERVICE_NAME: &str = "quartermaster-server";
