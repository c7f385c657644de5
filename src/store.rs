// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Runtime operator configuration and the store guarding it.
//!
//! The store holds exactly one immutable [`OperatorConfig`] value at a time
//! and swaps it wholesale on every AgentConfig observation. Readers take a
//! cheap `Arc` snapshot and never observe a half-updated configuration.

use crate::constants::{defaults, CONTROLLER_HOST_ENV_VAR, ENV_VAR_PREFIX, TOKEN_ENV_VAR};
use crate::types::agent_config::{AgentConfigSpec, MatcherSpec};
use k8s_openapi::api::core::v1::EnvVar;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};

/// One injection rule, decoupled from the CRD wire schema.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    pub namespace: String,
    pub deployment: String,
    pub container: String,
    pub labels: BTreeMap<String, String>,
    pub env_vars: Vec<EnvVar>,
}

impl Matcher {
    /// A matcher only activates the operator when it identifies where the
    /// injected agent should report to.
    fn has_credentials(&self) -> bool {
        self.env_vars
            .iter()
            .any(|e| e.name == TOKEN_ENV_VAR || e.name == CONTROLLER_HOST_ENV_VAR)
    }
}

impl From<&MatcherSpec> for Matcher {
    fn from(spec: &MatcherSpec) -> Self {
        Matcher {
            namespace: spec.namespace.clone(),
            deployment: spec.deployment.clone(),
            container: spec.container.clone(),
            labels: spec.labels.clone(),
            env_vars: spec
                .env_vars
                .iter()
                .map(|e| EnvVar {
                    name: e.name.clone(),
                    value: Some(e.value.clone()),
                    value_from: None,
                })
                .collect(),
        }
    }
}

/// The resolved injection parameters in effect for one configuration epoch.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub matchers: Vec<Matcher>,
    pub init_container_name: String,
    pub init_container_image: String,
    pub init_container_image_pull_policy: String,
    pub shared_volume_name: String,
    pub shared_volume_mount_path: String,
    pub requeue_after: Duration,
    /// No deployment is mutated until this is true
    pub is_ready: bool,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        OperatorConfig {
            matchers: Vec::new(),
            init_container_name: defaults::INIT_CONTAINER_NAME.to_string(),
            init_container_image: defaults::INIT_CONTAINER_IMAGE.to_string(),
            init_container_image_pull_policy: defaults::INIT_CONTAINER_PULL_POLICY.to_string(),
            shared_volume_name: defaults::SHARED_VOLUME_NAME.to_string(),
            shared_volume_mount_path: defaults::SHARED_VOLUME_MOUNT_PATH.to_string(),
            requeue_after: Duration::from_secs(defaults::REQUEUE_AFTER_SECS),
            is_ready: false,
        }
    }
}

impl OperatorConfig {
    /// The launch-flag token merged into the composite launch-options
    /// variable of every injected container.
    pub fn agent_flag(&self) -> String {
        format!("-javaagent:{}/agent.jar", self.shared_volume_mount_path)
    }
}

/// Guarded reference to the current configuration.
pub struct ConfigStore {
    current: RwLock<Arc<OperatorConfig>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        ConfigStore {
            current: RwLock::new(Arc::new(OperatorConfig::default())),
        }
    }

    /// The configuration snapshot in effect right now.
    pub fn snapshot(&self) -> Arc<OperatorConfig> {
        self.current.read().unwrap().clone()
    }

    /// Replace the configuration wholesale from an observed AgentConfig spec.
    /// Returns the resulting readiness. Activation is all-or-nothing: an
    /// empty matcher list, or any single matcher without credential
    /// environment variables, keeps the operator inert until fixed.
    pub fn replace(&self, spec: &AgentConfigSpec) -> bool {
        let mut config = OperatorConfig {
            matchers: spec.matchers.iter().map(Matcher::from).collect(),
            ..OperatorConfig::default()
        };

        resolve(&mut config.init_container_name, &spec.init_container_name);
        resolve(&mut config.init_container_image, &spec.init_container_image);
        resolve(
            &mut config.init_container_image_pull_policy,
            &spec.init_container_image_pull_policy,
        );
        resolve(&mut config.shared_volume_name, &spec.shared_volume_name);
        resolve(
            &mut config.shared_volume_mount_path,
            &spec.shared_volume_mount_path,
        );

        if let Some(secs) = spec.requeue_after_secs.filter(|s| *s > 0) {
            config.requeue_after = Duration::from_secs(secs);
        }

        config.is_ready = validate(&config.matchers);

        if config.is_ready {
            info!(
                matchers = config.matchers.len(),
                "Configuration accepted, operator is ready"
            );
        }

        let ready = config.is_ready;
        *self.current.write().unwrap() = Arc::new(config);
        ready
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve(target: &mut String, supplied: &Option<String>) {
    if let Some(value) = supplied.as_deref().filter(|v| !v.is_empty()) {
        *target = value.to_string();
    }
}

fn validate(matchers: &[Matcher]) -> bool {
    if matchers.is_empty() {
        warn!("Configuration has no matchers, operator stays inert");
        return false;
    }

    for (idx, matcher) in matchers.iter().enumerate() {
        if !matcher.has_credentials() {
            warn!(
                matcher = idx,
                "Matcher carries neither {} nor {}, operator stays inert until fixed",
                TOKEN_ENV_VAR,
                CONTROLLER_HOST_ENV_VAR
            );
            return false;
        }
        for env in &matcher.env_vars {
            if !env.name.starts_with(ENV_VAR_PREFIX) {
                warn!(
                    matcher = idx,
                    "{} lacks the {} prefix and will not be injected", env.name, ENV_VAR_PREFIX
                );
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::agent_config::InjectedEnvVar;

    fn token_var() -> InjectedEnvVar {
        InjectedEnvVar {
            name: TOKEN_ENV_VAR.to_string(),
            value: "abc".to_string(),
        }
    }

    fn matcher_with_token() -> MatcherSpec {
        MatcherSpec {
            env_vars: vec![token_var()],
            ..Default::default()
        }
    }

    #[test]
    fn test_replace_with_valid_matcher_becomes_ready() {
        let store = ConfigStore::new();
        assert!(!store.snapshot().is_ready);

        let ready = store.replace(&AgentConfigSpec {
            matchers: vec![matcher_with_token()],
            ..Default::default()
        });

        assert!(ready);
        assert!(store.snapshot().is_ready);
    }

    #[test]
    fn test_replace_with_empty_matchers_stays_inert() {
        let store = ConfigStore::new();
        let ready = store.replace(&AgentConfigSpec::default());

        assert!(!ready);
        assert!(!store.snapshot().is_ready);
    }

    #[test]
    fn test_single_matcher_without_credentials_blocks_everything() {
        let store = ConfigStore::new();
        let ready = store.replace(&AgentConfigSpec {
            matchers: vec![
                matcher_with_token(),
                MatcherSpec {
                    env_vars: vec![InjectedEnvVar {
                        name: "AGENT_LOG_LEVEL".to_string(),
                        value: "debug".to_string(),
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        });

        assert!(!ready);
    }

    #[test]
    fn test_controller_host_counts_as_credential() {
        let store = ConfigStore::new();
        let ready = store.replace(&AgentConfigSpec {
            matchers: vec![MatcherSpec {
                env_vars: vec![InjectedEnvVar {
                    name: CONTROLLER_HOST_ENV_VAR.to_string(),
                    value: "agents.internal:7070".to_string(),
                }],
                ..Default::default()
            }],
            ..Default::default()
        });

        assert!(ready);
    }

    #[test]
    fn test_defaults_applied_when_fields_absent() {
        let store = ConfigStore::new();
        store.replace(&AgentConfigSpec {
            matchers: vec![matcher_with_token()],
            ..Default::default()
        });

        let config = store.snapshot();
        assert_eq!(config.init_container_name, defaults::INIT_CONTAINER_NAME);
        assert_eq!(config.init_container_image, defaults::INIT_CONTAINER_IMAGE);
        assert_eq!(
            config.init_container_image_pull_policy,
            defaults::INIT_CONTAINER_PULL_POLICY
        );
        assert_eq!(config.shared_volume_name, defaults::SHARED_VOLUME_NAME);
        assert_eq!(
            config.shared_volume_mount_path,
            defaults::SHARED_VOLUME_MOUNT_PATH
        );
        assert_eq!(
            config.requeue_after,
            Duration::from_secs(defaults::REQUEUE_AFTER_SECS)
        );
    }

    #[test]
    fn test_supplied_fields_override_defaults() {
        let store = ConfigStore::new();
        store.replace(&AgentConfigSpec {
            matchers: vec![matcher_with_token()],
            init_container_image: Some("ghcr.io/hierynomus/stowaway-agent-init:v3".to_string()),
            shared_volume_mount_path: Some("/opt/agent".to_string()),
            requeue_after_secs: Some(45),
            ..Default::default()
        });

        let config = store.snapshot();
        assert_eq!(
            config.init_container_image,
            "ghcr.io/hierynomus/stowaway-agent-init:v3"
        );
        assert_eq!(config.shared_volume_mount_path, "/opt/agent");
        assert_eq!(config.requeue_after, Duration::from_secs(45));
        assert_eq!(config.agent_flag(), "-javaagent:/opt/agent/agent.jar");
    }

    #[test]
    fn test_zero_requeue_falls_back_to_default() {
        let store = ConfigStore::new();
        store.replace(&AgentConfigSpec {
            matchers: vec![matcher_with_token()],
            requeue_after_secs: Some(0),
            ..Default::default()
        });

        assert_eq!(
            store.snapshot().requeue_after,
            Duration::from_secs(defaults::REQUEUE_AFTER_SECS)
        );
    }

    #[test]
    fn test_invalid_replace_drops_readiness_of_previous_config() {
        let store = ConfigStore::new();
        store.replace(&AgentConfigSpec {
            matchers: vec![matcher_with_token()],
            ..Default::default()
        });
        assert!(store.snapshot().is_ready);

        store.replace(&AgentConfigSpec::default());
        assert!(!store.snapshot().is_ready);
    }
}
