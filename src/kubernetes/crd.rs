// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Waits for the AgentConfig CRD before the reconcilers start.

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::error::Result;
use kube::{discovery::Discovery, Client};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

const CRD_GROUP: &str = "stowaway.geeko.me";
const CRD_KIND: &str = "AgentConfig";
const CRD_VERSION: &str = "v1alpha1";

/// Wait for the AgentConfig CRD to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_agent_config_crd(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match check_agent_config_crd_exists(client).await {
            Ok(true) => {
                info!("AgentConfig CRD ({}/{}) is available", CRD_GROUP, CRD_VERSION);
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "AgentConfig CRD ({}/{}) not yet available, waiting {} seconds...",
                    CRD_GROUP, CRD_VERSION, interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for AgentConfig CRD: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        // Exponential backoff with max cap
        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

/// Check if the AgentConfig CRD exists by attempting to discover it.
async fn check_agent_config_crd_exists(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[CRD_GROUP])
        .run()
        .await?;

    for group in discovery.groups() {
        if group.name() == CRD_GROUP {
            for (ar, _) in group.recommended_resources() {
                if ar.kind == CRD_KIND && ar.version == CRD_VERSION {
                    return Ok(true);
                }
            }
        }
    }

    Ok(false)
}
