//! Graceful shutdown coordination

use tokio::sync::watch;

/// Broadcasts the stop signal to every server task.
///
/// Wraps a watch channel whose value flips to `true` exactly once.
/// Receivers are created on demand, so a task that starts waiting
/// after the signal has already fired still observes it.
#[derive(Clone)]
pub struct ShutdownService {
    stop: watch::Sender<bool>,
}

impl ShutdownService {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self { stop }
    }

    /// Flip the signal. Safe to call more than once, and recorded even
    /// when nothing is waiting yet.
    pub fn trigger(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.stop.borrow()
    }

    /// Future that resolves once shutdown has been triggered, suitable
    /// for `axum::serve(..).with_graceful_shutdown`.
    pub fn wait(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.stop.subscribe();
        async move {
            let _ = rx.wait_for(|&stop| stop).await;
        }
    }

    /// Spawn the OS signal listener that feeds the channel.
    pub fn install_signal_handlers(&self) {
        let service = self.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("Failed to install Ctrl+C handler");
            };

            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("Failed to install SIGTERM handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("Ctrl+C received, stopping"),
                _ = terminate => tracing::info!("SIGTERM received, stopping"),
            }

            service.trigger();
        });
    }
}

impl Default for ShutdownService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_untriggered() {
        assert!(!ShutdownService::new().is_triggered());
    }

    #[tokio::test]
    async fn test_trigger_is_observable_and_idempotent() {
        let shutdown = ShutdownService::new();
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn test_wait_resolves_after_trigger() {
        let shutdown = ShutdownService::new();
        let waiting = tokio::spawn(shutdown.wait());

        tokio::task::yield_now().await;
        shutdown.trigger();

        tokio::time::timeout(std::time::Duration::from_millis(100), waiting)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_after_trigger_resolves_immediately() {
        // The signal must not be lost when it fires before anyone waits
        let shutdown = ShutdownService::new();
        shutdown.trigger();

        tokio::time::timeout(std::time::Duration::from_millis(50), shutdown.wait())
            .await
            .unwrap();
    }
}
