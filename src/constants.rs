// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Field manager name attached to every patch this operator writes
pub const OPERATOR_NAME: &str = "stowaway";

/// Only environment variables carrying this prefix may be injected
pub const ENV_VAR_PREFIX: &str = "AGENT_";

/// Credential for the cloud-hosted agent backend
pub const TOKEN_ENV_VAR: &str = "AGENT_TOKEN";
/// Address of a self-hosted agent controller
pub const CONTROLLER_HOST_ENV_VAR: &str = "AGENT_CONTROLLER_HOST";

/// Composite launch-options variable the agent flag is merged into.
/// The JVM picks this up without touching the container command line.
pub const LAUNCH_OPTIONS_ENV_VAR: &str = "JAVA_TOOL_OPTIONS";

/// Fallback injection parameters, used when the AgentConfig leaves them empty
pub mod defaults {
    pub const INIT_CONTAINER_NAME: &str = "stowaway-agent-init";
    pub const INIT_CONTAINER_IMAGE: &str = "ghcr.io/hierynomus/stowaway-agent-init:latest";
    pub const INIT_CONTAINER_PULL_POLICY: &str = "Always";
    pub const SHARED_VOLUME_NAME: &str = "stowaway-agent";
    pub const SHARED_VOLUME_MOUNT_PATH: &str = "/stowaway";
    /// Requeue interval for deployment events arriving before a valid configuration
    pub const REQUEUE_AFTER_SECS: u64 = 10;
}

/// CRD polling configuration
pub mod crd {
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}
