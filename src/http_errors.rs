// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Classification of broker HTTP status codes.
//!
//! The reconciler decides how to react to a failed broker call from the HTTP
//! status alone:
//!
//! - **retriable** codes are retried through the work queue until the
//!   reconciliation retry window elapses;
//! - every other code is **terminal** for the current generation;
//! - codes in the **orphan-mitigation** set mean the broker may have created a
//!   resource even though it reported a failure, so a deprovision is issued.
//!
//! # Usage
//!
//! ```rust
//! use catalogd::http_errors::{is_retriable_http_status, should_start_orphan_mitigation};
//!
//! assert!(is_retriable_http_status(503));
//! assert!(should_start_orphan_mitigation(503));
//!
//! assert!(!is_retriable_http_status(409));
//! assert!(!should_start_orphan_mitigation(409));
//! ```

/// Determine if a broker HTTP status code should be retried.
///
/// | HTTP Code | Retriable |
/// |-----------|-----------|
/// | 408 | yes |
/// | 429 | yes |
/// | 5xx | yes |
/// | Other | no |
#[must_use]
pub fn is_retriable_http_status(status_code: u16) -> bool {
    status_code == 408 || status_code == 429 || (500..600).contains(&status_code)
}

/// Determine if a failed provision may have left a resource behind at the broker.
///
/// | HTTP Code | Orphan mitigation |
/// |-----------|-------------------|
/// | 2xx (any code the provision contract does not expect) | yes |
/// | 400, 401, 403, 404, 409, 410 | no |
/// | other 4xx | yes |
/// | 5xx | yes |
///
/// 409 means an instance with the same ID already exists with different
/// attributes; the request created nothing, so there is nothing to clean up.
#[must_use]
pub fn should_start_orphan_mitigation(status_code: u16) -> bool {
    match status_code {
        200..=299 => true,
        400 | 401 | 403 | 404 | 409 | 410 => false,
        400..=499 => true,
        500..=599 => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "http_errors_tests.rs"]
mod http_errors_tests;
