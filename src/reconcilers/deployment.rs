// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deployment reconciler - gates on configuration readiness, then runs the
//! mutation engine against a freshly fetched object.

use crate::error::{Result, StowawayError};
use crate::mutation;
use crate::reconcilers::Ctx;
use crate::tracker::DeploymentKey;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{
    runtime::{controller::Action, Controller},
    Api, Client,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub struct DeploymentReconciler {
    client: Client,
    ctx: Arc<Ctx>,
}

impl DeploymentReconciler {
    pub fn new(client: Client, ctx: Arc<Ctx>) -> Self {
        Self { client, ctx }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let deployments: Api<Deployment> = Api::all(self.client.clone());

        Controller::new(deployments, WatcherConfig::default())
            .run(reconcile, error_policy, self.ctx)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled deployment: {:?}", o),
                    Err(e) => warn!("Deployment reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(deployment: Arc<Deployment>, ctx: Arc<Ctx>) -> Result<Action> {
    let config = ctx.store.snapshot();
    let key = DeploymentKey::of(&deployment);

    // No mutation happens until a valid configuration has been observed.
    // There is no durable queue across restarts, so poll on a timer
    // instead of dropping the event.
    if !config.is_ready {
        debug!(
            "Configuration not ready yet, requeuing deployment {} in {:?}",
            key, config.requeue_after
        );
        return Ok(Action::requeue(config.requeue_after));
    }

    let api: Api<Deployment> = Api::namespaced(ctx.client.clone(), &key.namespace);
    let fresh = match api.get(&key.name).await {
        Ok(d) => d,
        Err(kube::Error::Api(e)) if e.code == 404 => {
            // Deleted between enqueue and fetch; deletion is not a failure
            debug!("Deployment {} not found, forgetting it", key);
            ctx.tracker.forget(&key);
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e.into()),
    };

    let outcome = mutation::sync(&ctx.client, &ctx.tracker, &fresh, &config).await?;
    debug!("Synced deployment {}: {:?}", key, outcome);

    Ok(Action::await_change())
}

fn error_policy(deployment: Arc<Deployment>, error: &StowawayError, _ctx: Arc<Ctx>) -> Action {
    error!(
        "Reconciliation of deployment {} failed: {}",
        DeploymentKey::of(&deployment),
        error
    );
    Action::requeue(Duration::from_secs(60))
}
