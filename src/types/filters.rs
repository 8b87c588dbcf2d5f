// Copyright 2026, Quartermaster Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config value types decoded from individual ConfigMap keys by the
//! dedicated getters on `SettingsManager`.

use serde::{Deserialize, Serialize};

/// One rule of the resource inclusion/exclusion filter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredResource {
    #[serde(default)]
    pub api_groups: Vec<String>,
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub clusters: Vec<String>,
}

/// Combined view of the `resource.inclusions` / `resource.exclusions` keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcesFilter {
    pub resource_inclusions: Vec<FilteredResource>,
    pub resource_exclusions: Vec<FilteredResource>,
}

/// Per-kind behavior override from `resource.customizations`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOverride {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub health_lua: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ignore_differences: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Definition of a config management plugin from `configManagementPlugins`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigManagementPlugin {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<Command>,
    pub generate: Command,
}
