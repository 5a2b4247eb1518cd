// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # catalogd - Open Service Broker Service Catalog for Kubernetes
//!
//! catalogd is a Kubernetes controller written in Rust that provisions,
//! updates and deprovisions `ServiceInstance` objects through Open Service
//! Broker (OSB) API brokers.
//!
//! ## Overview
//!
//! - Custom Resource Definitions for instances, bindings, classes, plans and brokers
//! - A per-instance state machine that drives broker operations and polls
//!   asynchronous ones
//! - Orphan mitigation when the outcome of a provision is ambiguous
//! - Cleanup of catalog entries that brokers no longer offer
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic
//! - [`osb`] - OSB client contract and its HTTP implementation
//! - [`broker_client_manager`] - Cache of broker clients keyed by broker
//! - [`queue`] - Rate-limited work queues
//! - [`store`] - Access to the Kubernetes API behind a trait
//! - [`controller`] - Queue workers, watches and graceful shutdown
//!
//! ## Example
//!
//! ```rust,no_run
//! use catalogd::crd::ServiceInstanceSpec;
//!
//! let spec = ServiceInstanceSpec {
//!     cluster_service_class_external_name: Some("mysql".to_string()),
//!     cluster_service_plan_external_name: Some("small".to_string()),
//!     external_id: "0b9e2c4a-7c4b-4fa2-9b6e-2d0d5f0e2a11".to_string(),
//!     ..Default::default()
//! };
//! assert!(spec.plan_reference().is_some());
//! ```
//!
//! For more information, see the [documentation](https://firestoned.github.io/catalogd/).

pub mod broker_client_manager;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod errors;
pub mod events;
pub mod http_errors;
pub mod metrics;
pub mod osb;
pub mod queue;
pub mod reconcilers;
pub mod server;
pub mod status_reasons;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
