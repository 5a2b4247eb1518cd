// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `http_errors` module

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_retriable_codes() {
        for code in [408, 429, 500, 502, 503, 504, 599] {
            assert!(is_retriable_http_status(code), "{code} should be retriable");
        }
    }

    #[test]
    fn test_terminal_codes() {
        for code in [200, 201, 204, 400, 401, 403, 404, 409, 410, 422] {
            assert!(!is_retriable_http_status(code), "{code} should be terminal");
        }
    }

    #[test]
    fn test_orphan_mitigation_for_unexpected_success() {
        assert!(should_start_orphan_mitigation(200));
        assert!(should_start_orphan_mitigation(204));
    }

    #[test]
    fn test_orphan_mitigation_for_client_errors() {
        for code in [408, 422, 429] {
            assert!(should_start_orphan_mitigation(code), "{code}");
        }
        for code in [400, 401, 403, 404, 409, 410] {
            assert!(!should_start_orphan_mitigation(code), "{code}");
        }
    }

    #[test]
    fn test_orphan_mitigation_for_server_errors() {
        for code in [500, 501, 502, 503, 504] {
            assert!(should_start_orphan_mitigation(code), "{code}");
        }
    }

    #[test]
    fn test_no_orphan_mitigation_for_informational_or_redirect() {
        assert!(!should_start_orphan_mitigation(100));
        assert!(!should_start_orphan_mitigation(301));
    }
}
