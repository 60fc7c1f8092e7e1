//! # OS termination signals.
//!
//! [`wait_for_shutdown_signal`] completes when the process is asked to stop:
//! `SIGINT`, `SIGTERM` or `SIGQUIT` on unix, Ctrl-C elsewhere.

use tracing::info;

use crate::error::RuntimeError;

/// Waits for a termination signal.
///
/// Each call installs its own listeners. Registration failures surface as
/// [`RuntimeError::Signal`].
#[cfg(unix)]
pub(crate) async fn wait_for_shutdown_signal() -> Result<(), RuntimeError> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = sigint.recv()  => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
        _ = sigquit.recv() => "SIGQUIT",
    };
    info!(signal = name, "termination signal received");
    Ok(())
}

/// Waits for a termination signal.
#[cfg(not(unix))]
pub(crate) async fn wait_for_shutdown_signal() -> Result<(), RuntimeError> {
    tokio::signal::ctrl_c().await?;
    info!(signal = "ctrl-c", "termination signal received");
    Ok(())
}
