// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `backoff.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::time::Duration;

    fn backoff() -> OperationBackoff {
        OperationBackoff::new(Duration::from_secs(1), Duration::from_secs(60))
    }

    #[test]
    fn test_no_delay_without_attempt() {
        let backoff = backoff();
        assert_eq!(backoff.pending_delay("uid-1", 1), None);
        assert!(backoff.is_empty());
    }

    #[test]
    fn test_delay_grows_with_each_attempt() {
        let backoff = backoff();

        backoff.mark_attempt("uid-1", 1);
        let first = backoff.pending_delay("uid-1", 1).unwrap();
        assert!(first <= Duration::from_secs(1));
        assert!(first > Duration::from_millis(500));

        backoff.mark_attempt("uid-1", 1);
        let second = backoff.pending_delay("uid-1", 1).unwrap();
        assert!(second > Duration::from_millis(1500));

        backoff.mark_attempt("uid-1", 1);
        let third = backoff.pending_delay("uid-1", 1).unwrap();
        assert!(third > Duration::from_millis(3500));
        assert_eq!(backoff.attempts("uid-1"), 3);
    }

    #[test]
    fn test_repeated_checks_do_not_grow_delay() {
        let backoff = backoff();
        backoff.mark_attempt("uid-1", 1);

        let first = backoff.pending_delay("uid-1", 1).unwrap();
        let again = backoff.pending_delay("uid-1", 1).unwrap();

        assert!(again <= first);
        assert_eq!(backoff.attempts("uid-1"), 1);
    }

    #[test]
    fn test_new_generation_starts_without_delay() {
        let backoff = backoff();
        backoff.mark_attempt("uid-1", 1);
        backoff.mark_attempt("uid-1", 1);
        assert!(backoff.pending_delay("uid-1", 1).is_some());

        assert_eq!(backoff.pending_delay("uid-1", 2), None);
        assert!(backoff.is_empty());
        assert_eq!(backoff.attempts("uid-1"), 0);

        backoff.mark_attempt("uid-1", 2);
        let delay = backoff.pending_delay("uid-1", 2).unwrap();
        assert!(delay <= Duration::from_secs(1));
    }

    #[test]
    fn test_mark_attempt_for_new_generation_resets_history() {
        let backoff = backoff();
        backoff.mark_attempt("uid-1", 1);
        backoff.pending_delay("uid-1", 1);
        backoff.mark_attempt("uid-1", 1);
        backoff.pending_delay("uid-1", 1);
        assert_eq!(backoff.attempts("uid-1"), 2);

        backoff.mark_attempt("uid-1", 2);
        assert_eq!(backoff.attempts("uid-1"), 0);
    }

    #[test]
    fn test_remove_clears_entry_and_history() {
        let backoff = backoff();
        backoff.mark_attempt("uid-1", 1);
        backoff.pending_delay("uid-1", 1);

        backoff.remove("uid-1");

        assert!(backoff.is_empty());
        assert_eq!(backoff.attempts("uid-1"), 0);
        assert_eq!(backoff.pending_delay("uid-1", 1), None);
    }

    #[test]
    fn test_entries_are_per_instance() {
        let backoff = backoff();
        backoff.mark_attempt("uid-1", 1);
        backoff.mark_attempt("uid-2", 1);
        backoff.pending_delay("uid-1", 1);

        backoff.remove("uid-1");

        assert_eq!(backoff.len(), 1);
        assert!(backoff.pending_delay("uid-2", 1).is_some());
    }

    #[test]
    fn test_purge_keeps_recent_entries() {
        let backoff = backoff();
        backoff.mark_attempt("uid-1", 1);
        backoff.pending_delay("uid-1", 1);

        assert_eq!(backoff.purge_expired(), 0);
        assert_eq!(backoff.len(), 1);
    }

    #[tokio::test]
    async fn test_purge_drops_entries_past_max_delay() {
        let backoff = OperationBackoff::new(Duration::from_millis(1), Duration::from_millis(5));
        backoff.mark_attempt("uid-1", 1);
        backoff.pending_delay("uid-1", 1);

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(backoff.purge_expired(), 1);
        assert!(backoff.is_empty());
        assert_eq!(backoff.attempts("uid-1"), 0);
    }
}
