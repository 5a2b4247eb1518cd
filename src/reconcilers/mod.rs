// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation logic for the service catalog resources.
//!
//! # Available Reconcilers
//!
//! - [`instance`] - drives `ServiceInstance` provisioning, updates,
//!   deprovisioning and last-operation polling against the owning broker
//! - [`catalog_cleanup`] - deletes classes and plans that brokers stopped
//!   offering once no instance references them
//!
//! Shared helpers live in [`status`] (condition bookkeeping) and [`retry`]
//! (Kubernetes API retries).
//!
//! # Example: Reconciling One Instance
//!
//! ```rust,no_run
//! use catalogd::reconcilers::instance::{reconcile_instance, InstanceContext, NextAction};
//!
//! async fn step(ctx: &InstanceContext) -> anyhow::Result<()> {
//!     match reconcile_instance(ctx, "default", "my-db").await? {
//!         NextAction::Done => {}
//!         NextAction::PollLater => ctx.polling.add_rate_limited("default/my-db"),
//!         NextAction::RetryAfter(delay) => tokio::time::sleep(delay).await,
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog_cleanup;
pub mod instance;
pub mod retry;
pub mod status;
