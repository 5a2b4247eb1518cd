// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Open Service Broker (OSB) client contract.
//!
//! The reconciler talks to brokers only through the [`OsbClient`] trait. The
//! production implementation is [`HttpOsbClient`]; tests substitute scripted
//! fakes. Clients are created by a [`ClientFactory`] owned by the
//! [`crate::broker_client_manager::BrokerClientManager`].
//!
//! # Example
//!
//! ```rust,no_run
//! use catalogd::osb::{http_client_factory, ClientConfiguration};
//! use std::time::Duration;
//!
//! let factory = http_client_factory();
//! let client = factory(&ClientConfiguration {
//!     name: "mysql-broker".to_string(),
//!     url: "https://broker.example.com".to_string(),
//!     api_version: "2.13".to_string(),
//!     auth: None,
//!     insecure: false,
//!     ca_data: None,
//!     timeout: Duration::from_secs(60),
//! });
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use config::{AuthConfig, BasicAuthConfig, BearerConfig, ClientConfiguration};
pub use error::OsbError;
pub use http::HttpOsbClient;
pub use types::{
    DeprovisionRequest, DeprovisionResponse, LastOperationRequest, LastOperationResponse,
    LastOperationState, OriginatingIdentity, PreviousValues, ProvisionRequest, ProvisionResponse,
    UpdateRequest, UpdateResponse,
};

use async_trait::async_trait;
use std::sync::Arc;

/// Operations the controller invokes on a broker.
#[async_trait]
pub trait OsbClient: Send + Sync {
    async fn provision_instance(
        &self,
        request: &ProvisionRequest,
    ) -> Result<ProvisionResponse, OsbError>;

    async fn update_instance(&self, request: &UpdateRequest) -> Result<UpdateResponse, OsbError>;

    async fn deprovision_instance(
        &self,
        request: &DeprovisionRequest,
    ) -> Result<DeprovisionResponse, OsbError>;

    async fn poll_last_operation(
        &self,
        request: &LastOperationRequest,
    ) -> Result<LastOperationResponse, OsbError>;
}

/// Builds a broker client from its configuration.
pub type ClientFactory =
    Arc<dyn Fn(&ClientConfiguration) -> Result<Arc<dyn OsbClient>, OsbError> + Send + Sync>;

/// Factory producing [`HttpOsbClient`]s.
#[must_use]
pub fn http_client_factory() -> ClientFactory {
    Arc::new(|config: &ClientConfiguration| {
        let client: Arc<dyn OsbClient> = Arc::new(HttpOsbClient::new(config)?);
        Ok(client)
    })
}
