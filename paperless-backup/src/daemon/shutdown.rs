//! Signal handling for SIGTERM and SIGINT.
//!
//! A signal never kills the run outright. It cancels the shared token; the
//! executor notices at its next checkpoint and unwinds through its guards,
//! so the service is restarted and the lock file removed.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Shutdown coordinator
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token cancelled once a shutdown signal arrives
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for a shutdown signal (SIGTERM or SIGINT), then cancel the token.
    ///
    /// Returns without cancelling if the token is cancelled elsewhere first.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                warn!("Failed to install SIGINT handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), aborting backup...");
            }
            _ = terminate => {
                info!("Received SIGTERM, aborting backup...");
            }
            _ = self.token.cancelled() => return,
        }

        self.token.cancel();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
