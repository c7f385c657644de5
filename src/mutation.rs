// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The mutation engine: computes and applies the injected (or rolled-back)
//! shape of a deployment's pod template.
//!
//! Everything is computed on a deep copy of the read-time object; that copy
//! is written back as a single merge patch, so each deployment's mutation is
//! independently atomic. Non-matching containers pass through untouched.

use crate::constants::{ENV_VAR_PREFIX, LAUNCH_OPTIONS_ENV_VAR, OPERATOR_NAME};
use crate::error::Result;
use crate::matchers::{collect_env_vars, matches};
use crate::store::{Matcher, OperatorConfig};
use crate::tracker::{DeploymentKey, DeploymentTracker};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, Volume, VolumeMount,
};
use kube::{
    api::{Patch, PatchParams},
    Api, Client,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The deployment already reflects the configuration, no write issued
    Unchanged,
    /// The agent was injected
    Patched,
    /// A previously injected agent was removed
    Unpatched,
}

/// Bring one deployment in line with the configuration: inject the agent
/// into every container with a winning matcher, or roll a previous
/// injection back when no container matches anymore. The tracker entry is
/// committed only after the patch call has returned.
pub async fn sync(
    client: &Client,
    tracker: &DeploymentTracker,
    deployment: &Deployment,
    config: &OperatorConfig,
) -> Result<SyncOutcome> {
    let key = DeploymentKey::of(deployment);
    let winners = winning_matchers(deployment, config);

    if winners.is_empty() {
        // The tracker can lose state across operator restarts, so the pod
        // template itself is consulted as well before skipping the rollback.
        if !tracker.is_patched(&key) && !has_agent(deployment, config) {
            tracker.put(deployment, false);
            return Ok(SyncOutcome::Unchanged);
        }

        let cleaned = remove_injection(deployment, config);
        if cleaned == *deployment {
            tracker.put(deployment, false);
            return Ok(SyncOutcome::Unchanged);
        }

        apply_patch(client, &key, &cleaned).await?;
        info!("Removed agent from deployment {}", key);
        tracker.put(&cleaned, false);
        return Ok(SyncOutcome::Unpatched);
    }

    let desired = apply_injection(deployment, &winners, config);
    if desired == *deployment {
        debug!("Deployment {} already carries the agent", key);
        tracker.put(deployment, true);
        return Ok(SyncOutcome::Unchanged);
    }

    apply_patch(client, &key, &desired).await?;
    info!(
        "Injected agent into {} container(s) of deployment {}",
        winners.len(),
        key
    );
    tracker.put(&desired, true);
    Ok(SyncOutcome::Patched)
}

/// Evaluate all matchers, in order, against every container of the pod
/// template. Per container the first full match wins; containers without a
/// winning rule are excluded from the injected set.
pub fn winning_matchers<'a>(
    deployment: &Deployment,
    config: &'a OperatorConfig,
) -> Vec<(usize, &'a Matcher)> {
    let Some(containers) = pod_containers(deployment) else {
        return Vec::new();
    };

    containers
        .iter()
        .enumerate()
        .filter_map(|(idx, container)| {
            config
                .matchers
                .iter()
                .find(|m| matches(m, deployment, container))
                .map(|m| (idx, m))
        })
        .collect()
}

/// True when the pod template already carries the reserved init container.
pub fn has_agent(deployment: &Deployment, config: &OperatorConfig) -> bool {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|p| p.init_containers.as_ref())
        .is_some_and(|ics| ics.iter().any(|c| c.name == config.init_container_name))
}

/// Compute the injected shape of the deployment. Idempotent: every append
/// checks for prior presence, so re-applying yields an identical object.
pub fn apply_injection(
    deployment: &Deployment,
    winners: &[(usize, &Matcher)],
    config: &OperatorConfig,
) -> Deployment {
    let mut desired = deployment.clone();

    let Some(pod_spec) = desired
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
    else {
        return desired;
    };

    for (idx, matcher) in winners {
        let container = &mut pod_spec.containers[*idx];
        inject_env_vars(container, &matcher.env_vars, config);
        inject_volume_mount(container, config);
    }

    let init_containers = pod_spec.init_containers.get_or_insert_with(Vec::new);
    if !init_containers
        .iter()
        .any(|c| c.name == config.init_container_name)
    {
        init_containers.push(agent_init_container(config));
    }

    let volumes = pod_spec.volumes.get_or_insert_with(Vec::new);
    if !volumes.iter().any(|v| v.name == config.shared_volume_name) {
        volumes.push(Volume {
            name: config.shared_volume_name.clone(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        });
    }

    desired
}

/// Compute the rolled-back shape of the deployment: injected env vars,
/// the launch flag token, the shared mount, the shared volume and the
/// reserved init container are all removed; everything else is preserved.
pub fn remove_injection(deployment: &Deployment, config: &OperatorConfig) -> Deployment {
    let mut cleaned = deployment.clone();

    let Some(pod_spec) = cleaned
        .spec
        .as_mut()
        .and_then(|s| s.template.spec.as_mut())
    else {
        return cleaned;
    };

    for container in &mut pod_spec.containers {
        if let Some(env) = container.env.as_mut() {
            env.retain(|e| !e.name.starts_with(ENV_VAR_PREFIX));
            strip_agent_flag(env, &config.agent_flag());
        }
        if let Some(mounts) = container.volume_mounts.as_mut() {
            mounts.retain(|m| m.name != config.shared_volume_name);
        }
    }

    if let Some(init_containers) = pod_spec.init_containers.as_mut() {
        init_containers.retain(|c| c.name != config.init_container_name);
    }
    if let Some(volumes) = pod_spec.volumes.as_mut() {
        volumes.retain(|v| v.name != config.shared_volume_name);
    }

    cleaned
}

fn inject_env_vars(container: &mut Container, candidates: &[EnvVar], config: &OperatorConfig) {
    let env = container.env.get_or_insert_with(Vec::new);

    // Overwrite on name collision so rotated values (tokens, controller
    // endpoints) reach already-injected deployments on the next resync.
    for var in collect_env_vars(candidates) {
        match env.iter_mut().find(|e| e.name == var.name) {
            Some(existing) => *existing = var,
            None => env.push(var),
        }
    }

    merge_agent_flag(env, &config.agent_flag());
}

/// Merge the launch flag into the composite launch-options variable.
/// Existing options are preserved; the flag is appended as one more
/// whitespace-separated token, never duplicated.
fn merge_agent_flag(env: &mut Vec<EnvVar>, flag: &str) {
    match env.iter_mut().find(|e| e.name == LAUNCH_OPTIONS_ENV_VAR) {
        Some(launch_options) => {
            let current = launch_options.value.clone().unwrap_or_default();
            if current.split_whitespace().any(|token| token == flag) {
                return;
            }
            launch_options.value = Some(if current.is_empty() {
                flag.to_string()
            } else {
                format!("{} {}", current, flag)
            });
        }
        None => env.push(EnvVar {
            name: LAUNCH_OPTIONS_ENV_VAR.to_string(),
            value: Some(flag.to_string()),
            value_from: None,
        }),
    }
}

/// Remove only the agent flag token from the launch-options variable,
/// dropping the variable entirely when no tokens remain.
fn strip_agent_flag(env: &mut Vec<EnvVar>, flag: &str) {
    let Some(idx) = env.iter().position(|e| e.name == LAUNCH_OPTIONS_ENV_VAR) else {
        return;
    };

    let remaining: Vec<&str> = env[idx]
        .value
        .as_deref()
        .unwrap_or_default()
        .split_whitespace()
        .filter(|token| *token != flag)
        .collect();

    if remaining.is_empty() {
        env.remove(idx);
    } else {
        env[idx].value = Some(remaining.join(" "));
    }
}

fn inject_volume_mount(container: &mut Container, config: &OperatorConfig) {
    let mounts = container.volume_mounts.get_or_insert_with(Vec::new);
    if !mounts.iter().any(|m| m.name == config.shared_volume_name) {
        mounts.push(VolumeMount {
            name: config.shared_volume_name.clone(),
            mount_path: config.shared_volume_mount_path.clone(),
            ..Default::default()
        });
    }
}

fn agent_init_container(config: &OperatorConfig) -> Container {
    Container {
        name: config.init_container_name.clone(),
        image: Some(config.init_container_image.clone()),
        image_pull_policy: Some(config.init_container_image_pull_policy.clone()),
        volume_mounts: Some(vec![VolumeMount {
            name: config.shared_volume_name.clone(),
            mount_path: config.shared_volume_mount_path.clone(),
            ..Default::default()
        }]),
        ..Default::default()
    }
}

fn pod_containers(deployment: &Deployment) -> Option<&Vec<Container>> {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .map(|p| &p.containers)
}

async fn apply_patch(client: &Client, key: &DeploymentKey, desired: &Deployment) -> Result<()> {
    let api: Api<Deployment> = Api::namespaced(client.clone(), &key.namespace);
    let params = PatchParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..Default::default()
    };
    api.patch(&key.name, &params, &Patch::Merge(desired)).await?;
    Ok(())
}
