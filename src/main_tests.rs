// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - CLI entry and signal handling

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    /// Test that SIGTERM signal handler can be created on Unix platforms
    #[tokio::test]
    #[cfg(unix)]
    async fn test_sigterm_signal_handler_creation() {
        use tokio::signal::unix::{signal, SignalKind};

        let result = signal(SignalKind::terminate());
        assert!(
            result.is_ok(),
            "Should be able to create SIGTERM signal handler"
        );
    }

    /// Without a signal the shutdown future stays pending
    #[tokio::test]
    async fn test_shutdown_signal_pending_without_signal() {
        let result = timeout(StdDuration::from_millis(100), controller::shutdown_signal()).await;
        assert!(result.is_err(), "shutdown_signal() should not resolve on its own");
    }

    #[test]
    fn test_completions_subcommand_parses() {
        let cli = Cli::try_parse_from(["catalogd", "completions", "bash"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Completions { .. })));
    }

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }
}
