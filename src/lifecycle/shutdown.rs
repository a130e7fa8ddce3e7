//! Graceful Shutdown Handler
//!
//! Waits for an OS signal and walks the kernel back down to its rest phase.

use crate::kernel::Kernel;
use tokio::signal;

/// Handles graceful shutdown of a kernel
///
/// ShutdownHandler listens for OS signals (SIGTERM, SIGINT) and then
/// requests the lowest phase, so every module runs its leave methods in
/// reverse execution order.
///
/// # Example
///
/// ```rust,ignore
/// use microkernel::{Kernel, ShutdownHandler};
///
/// let kernel = Kernel::builder().launch("started").await?;
/// ShutdownHandler::new(kernel).wait_for_shutdown().await;
/// ```
pub struct ShutdownHandler {
    kernel: Kernel,
}

impl ShutdownHandler {
    pub fn new(kernel: Kernel) -> Self {
        Self { kernel }
    }

    /// Wait for a shutdown signal, then bring the kernel down
    pub async fn wait_for_shutdown(&self) {
        shutdown_signal().await;
        self.shutdown().await;
    }

    /// Request the lowest phase, logging rather than returning failures
    pub async fn shutdown(&self) {
        let rest = self.kernel.machine().ladder().name(0).to_string();
        tracing::info!("Starting graceful shutdown...");

        match self.kernel.request_phase(&rest).await {
            Ok(_) => tracing::info!("Graceful shutdown complete"),
            Err(e) => tracing::error!("Error during shutdown: {}", e),
        }
    }
}

/// Create a future that completes when a shutdown signal is received
///
/// A handler that cannot be installed is logged and never fires, so the
/// other signal still decides when to shut down.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        hold_on_failure(signal::ctrl_c().await, "Ctrl+C").await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => hold_on_failure(Err(e), "SIGTERM").await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}

/// Return on success; on failure log and stay pending forever
async fn hold_on_failure<E: std::fmt::Display>(outcome: Result<(), E>, handler: &str) {
    if let Err(e) = outcome {
        tracing::error!("Failed to install {} handler: {}", handler, e);
        std::future::pending::<()>().await;
    }
}
