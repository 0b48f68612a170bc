//! Run-wide cancellation driven by process signals.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the token every job observes and turns signals into cancellation.
///
/// The first interrupt or terminate signal cancels the token. Later signals
/// are logged and otherwise ignored. Cancellation is never reset.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle to the shared token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Request cancellation. Returns `true` only for the first request.
    pub fn cancel(&self, reason: &str) -> bool {
        if self.token.is_cancelled() {
            info!("Received {} while already shutting down", reason);
            return false;
        }
        warn!("Received {}, shutting down. Running jobs will be stopped", reason);
        self.token.cancel();
        true
    }

    /// Spawn the signal listener.
    ///
    /// The listener runs until aborted. Failing to install a handler is
    /// logged and leaves that signal unhandled.
    pub fn listen(&self) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move { controller.signal_loop().await })
    }

    async fn signal_loop(self) {
        #[cfg(unix)]
        let mut terminate =
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(stream) => Some(stream),
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {}", e);
                    None
                }
            };

        loop {
            #[cfg(unix)]
            let term = async {
                match terminate.as_mut() {
                    Some(stream) => {
                        stream.recv().await;
                    }
                    None => std::future::pending::<()>().await,
                }
            };

            #[cfg(not(unix))]
            let term = std::future::pending::<()>();

            let reason = tokio::select! {
                result = signal::ctrl_c() => match result {
                    Ok(()) => "interrupt",
                    Err(e) => {
                        warn!("Failed to install Ctrl+C handler: {}", e);
                        return;
                    }
                },
                _ = term => "terminate signal",
            };

            self.cancel(reason);
        }
    }
}
