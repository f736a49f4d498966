//! Process signal handling.

/// Wait for a shutdown signal (SIGTERM or SIGINT, Ctrl+C elsewhere).
///
/// If the handlers cannot be installed the failure is logged and the future
/// never resolves, so the server keeps running until stopped another way.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::error!(error = %e, "failed to register signal handlers");
                    std::future::pending::<()>().await;
                    return;
                },
            };

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM");
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("received Ctrl+C"),
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_signal_wait_stays_pending() {
        let waited =
            tokio::time::timeout(Duration::from_millis(20), wait_for_shutdown_signal()).await;
        assert!(waited.is_err());
    }
}
