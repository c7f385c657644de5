// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StowawayError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),
}

impl StowawayError {
    /// True when the underlying API response was a 404.
    /// Not-found is recoverable at every call site: the object is gone,
    /// the tracker entry goes with it.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StowawayError::KubeError(kube::Error::Api(e)) if e.code == 404)
    }
}

pub type Result<T> = std::result::Result<T, StowawayError>;
