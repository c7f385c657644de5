// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::{info, warn};

use stowaway::kubernetes::wait_for_agent_config_crd;
use stowaway::reconcilers::{ConfigReconciler, Ctx, DeploymentReconciler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    info!("Starting Stowaway operator");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Wait for the AgentConfig CRD before starting reconcilers
    info!("Waiting for AgentConfig CRD to become available...");
    wait_for_agent_config_crd(&client).await?;

    // Shared configuration store and deployment state tracker
    let ctx = Ctx::new(client.clone());

    let config_reconciler = ConfigReconciler::new(client.clone(), ctx.clone());
    let deployment_reconciler = DeploymentReconciler::new(client, ctx);

    info!("Starting reconcilers...");

    // Run both reconcilers concurrently
    tokio::try_join!(config_reconciler.run(), deployment_reconciler.run())?;

    // This should never be reached as reconcilers run forever
    warn!("All reconcilers stopped unexpectedly");
    Ok(())
}
