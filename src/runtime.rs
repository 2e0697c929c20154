//! Process-level shutdown wiring shared by every agent binary (spec §6
//! "Exit codes"), grounded in [`crate::a2a::serve_with_graceful_shutdown`]'s
//! `CancellationToken` idiom.

use tokio_util::sync::CancellationToken;
use tracing::info;

/// Spawns a task that cancels the returned token on SIGTERM or Ctrl-C.
///
/// # Panics
///
/// Panics if a Unix SIGTERM handler cannot be installed.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let guard = token.clone();
    tokio::spawn(async move {
        let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install Ctrl-C handler") };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => info!("received Ctrl-C"),
            () = terminate => info!("received SIGTERM"),
        }
        guard.cancel();
    });
    token
}
