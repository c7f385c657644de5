// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative operator configuration. A single AgentConfig object drives
/// which deployments receive the diagnostics agent and with what identity.
/// This is the wire schema only; the runtime view lives in [`crate::store`].
#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "stowaway.geeko.me", version = "v1alpha1", kind = "AgentConfig")]
#[kube(namespaced)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfigSpec {
    /// Ordered injection rules; per container, the first full match wins
    #[serde(default)]
    pub matchers: Vec<MatcherSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_container_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_container_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_container_image_pull_policy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_volume_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_volume_mount_path: Option<String>,

    /// How long to defer deployment events while no valid configuration exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requeue_after_secs: Option<u64>,
}

/// One injection rule. Empty substring fields are wildcards; labels are
/// subset semantics (extra labels on the deployment are ignored).
#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MatcherSpec {
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub deployment: String,
    #[serde(default)]
    pub container: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub env_vars: Vec<InjectedEnvVar>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InjectedEnvVar {
    pub name: String,
    #[serde(default)]
    pub value: String,
}
