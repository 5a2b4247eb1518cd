// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command-line configuration for the catalogd controller.
//!
//! Every flag can also be set through a `CATALOGD_*` environment variable.
//!
//! # Example
//!
//! ```bash
//! catalogd --cluster-id prod-eu-1 --originating-identity --instance-workers 10
//! catalogd completions zsh > _catalogd
//! ```

use crate::constants::{
    DEFAULT_BROKER_TIMEOUT_SECS, DEFAULT_INSTANCE_WORKERS, DEFAULT_METRICS_PORT,
    DEFAULT_OSB_API_VERSION, DEFAULT_POLLING_MAX_DELAY_SECS, DEFAULT_POLLING_MIN_DELAY_MILLIS,
    DEFAULT_POLLING_WORKERS, DEFAULT_QUEUE_BURST, DEFAULT_QUEUE_QPS,
    DEFAULT_RECONCILIATION_RETRY_DURATION_SECS, DEFAULT_RESYNC_SECS,
};
use clap::{Parser, Subcommand};
use std::time::Duration;

/// catalogd - Open Service Broker service catalog controller for Kubernetes
#[derive(Parser, Debug)]
#[command(name = "catalogd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Cluster identifier sent to brokers (defaults to the kube-system namespace UID)
    #[arg(long, env = "CATALOGD_CLUSTER_ID")]
    pub cluster_id: Option<String>,

    /// How long a retriable operation may keep failing before it is failed terminally
    #[arg(
        long,
        env = "CATALOGD_RECONCILIATION_RETRY_DURATION_SECS",
        default_value_t = DEFAULT_RECONCILIATION_RETRY_DURATION_SECS
    )]
    pub reconciliation_retry_duration_secs: u64,

    /// Send the X-Broker-API-Originating-Identity header
    #[arg(long, env = "CATALOGD_ORIGINATING_IDENTITY")]
    pub originating_identity: bool,

    /// Number of ServiceInstance workers
    #[arg(long, env = "CATALOGD_INSTANCE_WORKERS", default_value_t = DEFAULT_INSTANCE_WORKERS)]
    pub instance_workers: usize,

    /// Number of last-operation polling workers
    #[arg(long, env = "CATALOGD_POLLING_WORKERS", default_value_t = DEFAULT_POLLING_WORKERS)]
    pub polling_workers: usize,

    /// First delay between polls of an async operation
    #[arg(
        long,
        env = "CATALOGD_POLLING_MIN_DELAY_MS",
        default_value_t = DEFAULT_POLLING_MIN_DELAY_MILLIS
    )]
    pub polling_min_delay_ms: u64,

    /// Longest delay between polls of an async operation
    #[arg(
        long,
        env = "CATALOGD_POLLING_MAX_DELAY_SECS",
        default_value_t = DEFAULT_POLLING_MAX_DELAY_SECS
    )]
    pub polling_max_delay_secs: u64,

    /// Work queue rate (items per second)
    #[arg(long, env = "CATALOGD_QUEUE_QPS", default_value_t = DEFAULT_QUEUE_QPS)]
    pub queue_qps: f64,

    /// Work queue burst
    #[arg(long, env = "CATALOGD_QUEUE_BURST", default_value_t = DEFAULT_QUEUE_BURST)]
    pub queue_burst: u32,

    /// Timeout of a single broker request
    #[arg(
        long,
        env = "CATALOGD_BROKER_TIMEOUT_SECS",
        default_value_t = DEFAULT_BROKER_TIMEOUT_SECS
    )]
    pub broker_timeout_secs: u64,

    /// OSB API version announced to brokers
    #[arg(long, env = "CATALOGD_OSB_API_VERSION", default_value = DEFAULT_OSB_API_VERSION)]
    pub osb_api_version: String,

    /// Port of the metrics and health server
    #[arg(long, env = "CATALOGD_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Interval between full resyncs of every ServiceInstance
    #[arg(long, env = "CATALOGD_RESYNC_SECS", default_value_t = DEFAULT_RESYNC_SECS)]
    pub resync_secs: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Settings shared by the reconcilers and the runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    /// `organization_guid` and `clusterid` sent to brokers
    pub cluster_id: String,
    pub reconciliation_retry_duration: Duration,
    pub originating_identity: bool,
    pub instance_workers: usize,
    pub polling_workers: usize,
    pub polling_min_delay: Duration,
    pub polling_max_delay: Duration,
    pub queue_qps: f64,
    pub queue_burst: u32,
    pub broker_timeout: Duration,
    pub osb_api_version: String,
    pub metrics_port: u16,
    pub resync_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cluster_id: String::new(),
            reconciliation_retry_duration: Duration::from_secs(
                DEFAULT_RECONCILIATION_RETRY_DURATION_SECS,
            ),
            originating_identity: false,
            instance_workers: DEFAULT_INSTANCE_WORKERS,
            polling_workers: DEFAULT_POLLING_WORKERS,
            polling_min_delay: Duration::from_millis(DEFAULT_POLLING_MIN_DELAY_MILLIS),
            polling_max_delay: Duration::from_secs(DEFAULT_POLLING_MAX_DELAY_SECS),
            queue_qps: DEFAULT_QUEUE_QPS,
            queue_burst: DEFAULT_QUEUE_BURST,
            broker_timeout: Duration::from_secs(DEFAULT_BROKER_TIMEOUT_SECS),
            osb_api_version: DEFAULT_OSB_API_VERSION.to_string(),
            metrics_port: DEFAULT_METRICS_PORT,
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_SECS),
        }
    }
}

impl ControllerConfig {
    /// Build the configuration from parsed flags.
    ///
    /// `cluster_id` is left empty when the flag is absent; the runtime fills it
    /// in before the controllers start.
    #[must_use]
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            cluster_id: cli.cluster_id.clone().unwrap_or_default(),
            reconciliation_retry_duration: Duration::from_secs(
                cli.reconciliation_retry_duration_secs,
            ),
            originating_identity: cli.originating_identity,
            instance_workers: cli.instance_workers.max(1),
            polling_workers: cli.polling_workers.max(1),
            polling_min_delay: Duration::from_millis(cli.polling_min_delay_ms),
            polling_max_delay: Duration::from_secs(cli.polling_max_delay_secs),
            queue_qps: cli.queue_qps,
            queue_burst: cli.queue_burst,
            broker_timeout: Duration::from_secs(cli.broker_timeout_secs),
            osb_api_version: cli.osb_api_version.clone(),
            metrics_port: cli.metrics_port,
            resync_interval: Duration::from_secs(cli.resync_secs),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
