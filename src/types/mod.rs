// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Typed settings snapshot and the config value types decoded from it.

pub mod filters;
pub mod settings;

pub use filters::{Command, ConfigManagementPlugin, FilteredResource, ResourceOverride, ResourcesFilter};
pub use settings::{
    resolve_secret_reference, HelmRepoCredentials, OidcConfig, RepoCredentials, SecretKeyRef,
    Settings, TlsCertificate,
};
