// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! AgentConfig reconciler - replaces the configuration and resyncs every
//! tracked deployment so loosened or tightened rules apply immediately,
//! without waiting for each deployment's own watch event.

use crate::error::{Result, StowawayError};
use crate::mutation;
use crate::reconcilers::Ctx;
use crate::types::agent_config::AgentConfig;
use futures::StreamExt;
use kube::{
    runtime::{controller::Action, watcher, Controller},
    Api, Client, ResourceExt,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct ConfigReconciler {
    client: Client,
    ctx: Arc<Ctx>,
}

impl ConfigReconciler {
    pub fn new(client: Client, ctx: Arc<Ctx>) -> Self {
        Self { client, ctx }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let configs: Api<AgentConfig> = Api::all(self.client.clone());

        Controller::new(configs, watcher::Config::default())
            .run(reconcile, error_policy, self.ctx)
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled configuration: {:?}", o),
                    Err(e) => warn!("Configuration reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

async fn reconcile(config: Arc<AgentConfig>, ctx: Arc<Ctx>) -> Result<Action> {
    info!("Observed configuration {}", config.name_any());

    let ready = ctx.store.replace(&config.spec);
    debug!(ready, "Configuration replaced");

    resync_tracked(&ctx).await;

    Ok(Action::await_change())
}

/// Walk every tracked deployment through the mutation engine under the
/// configuration now in effect. Per-deployment failures are logged and do
/// not abort the walk; deployments that vanished are evicted.
pub async fn resync_tracked(ctx: &Ctx) {
    let config = ctx.store.snapshot();
    let entries = ctx.tracker.entries();

    if entries.is_empty() {
        return;
    }

    info!("Resyncing {} tracked deployment(s)", entries.len());

    for (key, tracked) in entries {
        match mutation::sync(&ctx.client, &ctx.tracker, &tracked.deployment, &config).await {
            Ok(outcome) => debug!("Resynced deployment {}: {:?}", key, outcome),
            Err(e) if e.is_not_found() => {
                debug!("Deployment {} no longer exists, forgetting it", key);
                ctx.tracker.forget(&key);
            }
            Err(e) => error!("Resync of deployment {} failed: {}", key, e),
        }
    }
}

fn error_policy(_config: Arc<AgentConfig>, error: &StowawayError, _ctx: Arc<Ctx>) -> Action {
    error!("Configuration reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(60))
}
