// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the catalogd controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all service catalog CRDs
pub const API_GROUP: &str = "servicecatalog.k8s.io";

/// API version for all service catalog CRDs
pub const API_VERSION: &str = "v1beta1";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "servicecatalog.k8s.io/v1beta1";

/// Kind name for `ServiceInstance` resource
pub const KIND_SERVICE_INSTANCE: &str = "ServiceInstance";

/// Kind name for `ServiceBinding` resource
pub const KIND_SERVICE_BINDING: &str = "ServiceBinding";

/// Kind name for `ClusterServiceClass` resource
pub const KIND_CLUSTER_SERVICE_CLASS: &str = "ClusterServiceClass";

/// Kind name for `ServiceClass` resource
pub const KIND_SERVICE_CLASS: &str = "ServiceClass";

/// Kind name for `ClusterServicePlan` resource
pub const KIND_CLUSTER_SERVICE_PLAN: &str = "ClusterServicePlan";

/// Kind name for `ServicePlan` resource
pub const KIND_SERVICE_PLAN: &str = "ServicePlan";

/// Kind name for `ClusterServiceBroker` resource
pub const KIND_CLUSTER_SERVICE_BROKER: &str = "ClusterServiceBroker";

/// Kind name for `ServiceBroker` resource
pub const KIND_SERVICE_BROKER: &str = "ServiceBroker";

/// Finalizer placed on every `ServiceInstance` until the broker-side resource is gone
pub const FINALIZER_SERVICE_CATALOG: &str = "kubernetes-incubator/service-catalog";

/// Field manager / event reporter name
pub const CONTROLLER_NAME: &str = "catalogd";

// ============================================================================
// Condition Types and Statuses
// ============================================================================

/// Condition type summarizing whether the instance is usable
pub const CONDITION_TYPE_READY: &str = "Ready";

/// Condition type set when an operation failed terminally
pub const CONDITION_TYPE_FAILED: &str = "Failed";

/// Condition type present while orphan mitigation is running
pub const CONDITION_TYPE_ORPHAN_MITIGATION: &str = "OrphanMitigation";

/// Condition status `True`
pub const CONDITION_STATUS_TRUE: &str = "True";

/// Condition status `False`
pub const CONDITION_STATUS_FALSE: &str = "False";

/// Condition status `Unknown`
pub const CONDITION_STATUS_UNKNOWN: &str = "Unknown";

// ============================================================================
// Open Service Broker Constants
// ============================================================================

/// Platform identifier sent in the request context and originating identity header
pub const OSB_PLATFORM_KUBERNETES: &str = "kubernetes";

/// Key of the cluster identifier inside the request context
pub const OSB_CONTEXT_CLUSTER_ID_KEY: &str = "clusterid";

/// Header carrying the OSB API version
pub const OSB_API_VERSION_HEADER: &str = "X-Broker-API-Version";

/// Header carrying the originating identity
pub const OSB_ORIGINATING_IDENTITY_HEADER: &str = "X-Broker-API-Originating-Identity";

/// Default OSB API version spoken to brokers
pub const DEFAULT_OSB_API_VERSION: &str = "2.13";

/// Default per-request broker timeout (seconds)
pub const DEFAULT_BROKER_TIMEOUT_SECS: u64 = 60;

/// Placeholder stored in status for parameter values sourced from secrets
pub const REDACTED_PARAMETER_VALUE: &str = "<redacted>";

/// Secret key holding the basic-auth user name
pub const SECRET_KEY_USERNAME: &str = "username";

/// Secret key holding the basic-auth password
pub const SECRET_KEY_PASSWORD: &str = "password";

/// Secret key holding the bearer token
pub const SECRET_KEY_TOKEN: &str = "token";

// ============================================================================
// Reconciliation Timing Constants
// ============================================================================

/// Default reconciliation retry window (7 days)
pub const DEFAULT_RECONCILIATION_RETRY_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Interval between status write attempts after a conflict (100 ms)
pub const STATUS_CONFLICT_RETRY_INTERVAL_MILLIS: u64 = 100;

/// Total time spent retrying a conflicting status write (10 seconds)
pub const STATUS_CONFLICT_RETRY_TIMEOUT_SECS: u64 = 10;

/// Default periodic resync of all instances (5 minutes)
pub const DEFAULT_RESYNC_SECS: u64 = 300;

/// Requeue interval for the catalog cleanup controllers (5 minutes)
pub const CATALOG_CLEANUP_REQUEUE_SECS: u64 = 300;

/// Requeue interval after a catalog cleanup error (30 seconds)
pub const CATALOG_CLEANUP_ERROR_REQUEUE_SECS: u64 = 30;

// ============================================================================
// Work Queue Constants
// ============================================================================

/// Primary queue per-key backoff floor (5 ms)
pub const PRIMARY_QUEUE_BASE_DELAY_MILLIS: u64 = 5;

/// Primary queue per-key backoff ceiling (1000 s)
pub const PRIMARY_QUEUE_MAX_DELAY_SECS: u64 = 1000;

/// Primary queue global rate (items per second)
pub const DEFAULT_QUEUE_QPS: f64 = 10.0;

/// Primary queue global burst
pub const DEFAULT_QUEUE_BURST: u32 = 100;

/// Polling queue per-key backoff floor (1 s)
pub const DEFAULT_POLLING_MIN_DELAY_MILLIS: u64 = 1000;

/// Polling queue per-key backoff ceiling (20 minutes)
pub const DEFAULT_POLLING_MAX_DELAY_SECS: u64 = 1200;

/// Floor of the per-generation backoff between provision or update attempts (1 s)
pub const BROKER_OPERATION_RETRY_MIN_DELAY_SECS: u64 = 1;

/// Ceiling of the per-generation backoff between provision or update attempts (20 minutes)
pub const BROKER_OPERATION_RETRY_MAX_DELAY_SECS: u64 = 1200;

/// How often expired broker operation backoff entries are dropped
pub const BROKER_OPERATION_RETRY_PURGE_SECS: u64 = 600;

/// Default number of primary queue workers
pub const DEFAULT_INSTANCE_WORKERS: usize = 5;

/// Default number of polling queue workers
pub const DEFAULT_POLLING_WORKERS: usize = 2;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Default metrics/health server port
pub const DEFAULT_METRICS_PORT: u16 = 8080;

/// Number of tokio worker threads
pub const TOKIO_WORKER_THREADS: usize = 4;

/// Namespace whose UID is used as the default cluster identifier
pub const CLUSTER_ID_SOURCE_NAMESPACE: &str = "kube-system";
