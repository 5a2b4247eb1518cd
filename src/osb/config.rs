// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Broker connection configuration.
//!
//! [`ClientConfiguration`] is compared structurally (derived `PartialEq`) to
//! decide whether a cached broker client must be rebuilt. The comparison is
//! deliberately strict about presence:
//!
//! - `auth: None` differs from `auth: Some(AuthConfig { basic: None, bearer: None })`
//! - `ca_data: None` differs from `ca_data: Some(vec![])`
//!
//! A broker object that starts carrying an (empty) auth stanza therefore gets a
//! fresh client.

use std::fmt;
use std::time::Duration;

/// Everything needed to build an HTTP client for one broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfiguration {
    /// Broker name, used in logs.
    pub name: String,
    pub url: String,
    /// Value of the `X-Broker-API-Version` header.
    pub api_version: String,
    pub auth: Option<AuthConfig>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// PEM CA bundle trusted in addition to the system roots.
    pub ca_data: Option<Vec<u8>>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Broker authentication. At most one of the two is used; basic wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub basic: Option<BasicAuthConfig>,
    pub bearer: Option<BearerConfig>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for BasicAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct BearerConfig {
    pub token: String,
}

impl fmt::Debug for BearerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerConfig")
            .field("token", &"<redacted>")
            .finish()
    }
}
