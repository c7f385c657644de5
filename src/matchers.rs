// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pure matcher predicates deciding which containers receive the agent.

use crate::constants::ENV_VAR_PREFIX;
use crate::store::Matcher;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Container, EnvVar};
use tracing::warn;

/// True when all four predicates hold: namespace, deployment name and
/// container name substring filters (empty = wildcard) plus the
/// required-label subset. Matching is case-sensitive substring
/// containment, deliberately not glob or regex.
pub fn matches(matcher: &Matcher, deployment: &Deployment, container: &Container) -> bool {
    namespace_matches(matcher, deployment)
        && deployment_matches(matcher, deployment)
        && container_matches(matcher, container)
        && labels_match(matcher, deployment)
}

fn namespace_matches(matcher: &Matcher, deployment: &Deployment) -> bool {
    matcher.namespace.is_empty()
        || deployment
            .metadata
            .namespace
            .as_deref()
            .unwrap_or_default()
            .contains(&matcher.namespace)
}

fn deployment_matches(matcher: &Matcher, deployment: &Deployment) -> bool {
    matcher.deployment.is_empty()
        || deployment
            .metadata
            .name
            .as_deref()
            .unwrap_or_default()
            .contains(&matcher.deployment)
}

fn container_matches(matcher: &Matcher, container: &Container) -> bool {
    matcher.container.is_empty() || container.name.contains(&matcher.container)
}

/// Every required label must be present with an identical value; extra
/// labels on the deployment are ignored.
fn labels_match(matcher: &Matcher, deployment: &Deployment) -> bool {
    let labels = deployment.metadata.labels.as_ref();

    matcher.labels.iter().all(|(key, value)| {
        labels.and_then(|l| l.get(key)).is_some_and(|v| v == value)
    })
}

/// Filter a matcher's candidate variables down to the injectable set.
/// Variables without the reserved prefix are dropped with a warning,
/// never an error.
pub fn collect_env_vars(candidates: &[EnvVar]) -> Vec<EnvVar> {
    candidates
        .iter()
        .filter(|env| {
            let allowed = env.name.starts_with(ENV_VAR_PREFIX);
            if !allowed {
                warn!(
                    "{} is not a valid injection variable, only {} prefixed names are allowed",
                    env.name, ENV_VAR_PREFIX
                );
            }
            allowed
        })
        .cloned()
        .collect()
}
