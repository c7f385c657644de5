// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes reconcilers that react to watch events.

pub mod config;
pub mod deployment;

pub use config::ConfigReconciler;
pub use deployment::DeploymentReconciler;

use crate::store::ConfigStore;
use crate::tracker::DeploymentTracker;
use kube::Client;
use std::sync::Arc;

/// State shared by both reconcilers. Reconciles for distinct object keys
/// run concurrently, so the store and tracker carry their own locks.
pub struct Ctx {
    pub client: Client,
    pub store: Arc<ConfigStore>,
    pub tracker: Arc<DeploymentTracker>,
}

impl Ctx {
    pub fn new(client: Client) -> Arc<Self> {
        Arc::new(Ctx {
            client,
            store: Arc::new(ConfigStore::new()),
            tracker: Arc::new(DeploymentTracker::new()),
        })
    }
}
