// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Keyed pool of OSB clients, one per broker.
//!
//! The manager hands out the current client for a broker and rebuilds it
//! whenever the broker's [`ClientConfiguration`] drifts. Entries live until the
//! broker is removed; there is no eviction.
//!
//! # Example
//!
//! ```rust,no_run
//! use catalogd::broker_client_manager::{BrokerClientManager, BrokerKey};
//! use catalogd::osb::{http_client_factory, ClientConfiguration};
//! use std::time::Duration;
//!
//! let manager = BrokerClientManager::new(http_client_factory());
//! let key = BrokerKey::cluster("mysql-broker");
//! let config = ClientConfiguration {
//!     name: "mysql-broker".to_string(),
//!     url: "https://broker.example.com".to_string(),
//!     api_version: "2.13".to_string(),
//!     auth: None,
//!     insecure: false,
//!     ca_data: None,
//!     timeout: Duration::from_secs(60),
//! };
//! let client = manager.update_broker_client(&key, &config)?;
//! # Ok::<(), catalogd::osb::OsbError>(())
//! ```

use crate::osb::{ClientConfiguration, ClientFactory, OsbClient, OsbError};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Identifies a broker. An empty namespace means cluster-scoped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BrokerKey {
    pub namespace: String,
    pub name: String,
}

impl BrokerKey {
    #[must_use]
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: String::new(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn is_cluster_scoped(&self) -> bool {
        self.namespace.is_empty()
    }
}

impl fmt::Display for BrokerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cluster_scoped() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

struct BrokerClientEntry {
    client: Arc<dyn OsbClient>,
    config: ClientConfiguration,
}

/// Broker clients keyed by [`BrokerKey`].
pub struct BrokerClientManager {
    clients: RwLock<HashMap<BrokerKey, BrokerClientEntry>>,
    factory: ClientFactory,
}

impl BrokerClientManager {
    #[must_use]
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Return the client for `key`, building a new one when none exists or the
    /// stored configuration differs from `config`.
    ///
    /// The factory runs under the write lock.
    ///
    /// # Errors
    ///
    /// Returns the factory's error unchanged; the pool is left untouched.
    pub fn update_broker_client(
        &self,
        key: &BrokerKey,
        config: &ClientConfiguration,
    ) -> Result<Arc<dyn OsbClient>, OsbError> {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(entry) = clients.get(key) {
            if entry.config == *config {
                return Ok(Arc::clone(&entry.client));
            }
            info!(broker = %key, "Broker configuration changed, rebuilding client");
        } else {
            debug!(broker = %key, "Creating broker client");
        }

        let client = (self.factory)(config)?;
        clients.insert(
            key.clone(),
            BrokerClientEntry {
                client: Arc::clone(&client),
                config: config.clone(),
            },
        );
        Ok(client)
    }

    /// Current client for `key`, if one has been built.
    #[must_use]
    pub fn broker_client(&self, key: &BrokerKey) -> Option<Arc<dyn OsbClient>> {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|entry| Arc::clone(&entry.client))
    }

    pub fn remove_broker_client(&self, key: &BrokerKey) {
        let removed = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        if removed.is_some() {
            info!(broker = %key, "Removed broker client");
        }
    }
}

#[cfg(test)]
#[path = "broker_client_manager_tests.rs"]
mod broker_client_manager_tests;
