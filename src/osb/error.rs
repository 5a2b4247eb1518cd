// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Errors returned by OSB clients.

use thiserror::Error;

/// A failed broker call.
///
/// The reconciler only distinguishes two classes: the broker answered with an
/// HTTP error status ([`OsbError::Http`]), or no usable answer arrived
/// (everything else, possibly a timeout).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OsbError {
    /// The broker answered with a status the operation does not accept.
    #[error(
        "Status: {status_code}; ErrorMessage: {}; Description: {}",
        .error_message.as_deref().unwrap_or("<nil>"),
        .description.as_deref().unwrap_or("<nil>")
    )]
    Http {
        /// HTTP status code
        status_code: u16,
        /// `error` field of the broker's error body
        error_message: Option<String>,
        /// `description` field of the broker's error body
        description: Option<String>,
    },

    /// The request could not be sent or the response could not be read.
    #[error("{message}")]
    Transport {
        /// Underlying error text
        message: String,
        /// True when the request hit the client timeout
        timeout: bool,
    },

    /// The broker answered with a body that does not follow the OSB contract.
    #[error("invalid response from broker: {0}")]
    InvalidResponse(String),

    /// The client could not be built from its configuration.
    #[error("invalid broker client configuration: {0}")]
    Configuration(String),
}

impl OsbError {
    /// HTTP status of an [`OsbError::Http`].
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// True for HTTP 410 Gone.
    #[must_use]
    pub fn is_gone(&self) -> bool {
        self.http_status() == Some(410)
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { timeout: true, .. })
    }
}
