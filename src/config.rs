// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Controller-wide configuration.
//!
//! Provider plugins take their agent image from here, never from the owning
//! LoadBalancer spec.

use crate::constants::{DEFAULT_PROVIDER_IMAGE, DEFAULT_SYNC_WORKERS, METRICS_SERVER_PORT};
use clap::Parser;

/// Command-line / environment configuration for the controller process.
#[derive(Parser, Clone, Debug)]
#[command(name = "loadbalancer-provider", about = "LoadBalancer provider controller")]
pub struct Configuration {
    /// Container image for the azure provider agent
    #[arg(long, env = "AZURE_PROVIDER_IMAGE", default_value = DEFAULT_PROVIDER_IMAGE)]
    pub azure_image: String,

    /// Number of workers draining each provider's sync queue
    #[arg(long, env = "SYNC_WORKERS", default_value_t = DEFAULT_SYNC_WORKERS)]
    pub workers: usize,

    /// Port for the Prometheus metrics endpoint
    #[arg(long, env = "METRICS_PORT", default_value_t = METRICS_SERVER_PORT)]
    pub metrics_port: u16,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            azure_image: DEFAULT_PROVIDER_IMAGE.to_string(),
            workers: DEFAULT_SYNC_WORKERS,
            metrics_port: METRICS_SERVER_PORT,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
