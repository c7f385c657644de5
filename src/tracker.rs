// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Last-known patch state of every deployment this operator has seen.
//!
//! The tracker exists to make resync-on-configuration-change cheap:
//! instead of re-listing every deployment in the cluster, the controller
//! replays mutation logic over the snapshots recorded here.

use k8s_openapi::api::apps::v1::Deployment;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Identity of a deployment, stable across spec updates and label churn.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeploymentKey {
    pub namespace: String,
    pub name: String,
}

impl DeploymentKey {
    pub fn of(deployment: &Deployment) -> Self {
        DeploymentKey {
            namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
            name: deployment.metadata.name.clone().unwrap_or_default(),
        }
    }
}

impl fmt::Display for DeploymentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct TrackedDeployment {
    /// Last object body seen, replayed during full resync
    pub deployment: Deployment,
    /// True when the deployment currently carries the injected agent
    pub is_patched: bool,
}

pub struct DeploymentTracker {
    inner: Mutex<HashMap<DeploymentKey, TrackedDeployment>>,
}

impl DeploymentTracker {
    pub fn new() -> Self {
        DeploymentTracker {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn put(&self, deployment: &Deployment, is_patched: bool) {
        let key = DeploymentKey::of(deployment);
        self.inner.lock().unwrap().insert(
            key,
            TrackedDeployment {
                deployment: deployment.clone(),
                is_patched,
            },
        );
    }

    pub fn get(&self, key: &DeploymentKey) -> Option<TrackedDeployment> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    pub fn forget(&self, key: &DeploymentKey) {
        self.inner.lock().unwrap().remove(key);
    }

    pub fn is_patched(&self, key: &DeploymentKey) -> bool {
        self.inner
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|t| t.is_patched)
    }

    /// Snapshot of all tracked entries. Cloned out so the lock is not
    /// held while callers do API I/O per entry.
    pub fn entries(&self) -> Vec<(DeploymentKey, TrackedDeployment)> {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

impl Default for DeploymentTracker {
    fn default() -> Self {
        Self::new()
    }
}
