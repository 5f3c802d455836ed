//! Operator interrupt handling.
//!
//! [`shutdown_signal`] completes when the operator asks the wrapper to stop:
//! `SIGINT` (Ctrl-C) or `SIGTERM` (systemd/Kubernetes) on unix, Ctrl-C
//! elsewhere. Each call installs independent listeners.

/// Waits for a termination signal from the operator.
///
/// Returns `Ok(())` when a signal is received, or `Err` if listener
/// registration fails.
#[cfg(unix)]
pub async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
    Ok(())
}

/// Waits for a termination signal from the operator.
///
/// Returns `Ok(())` when a signal is received, or `Err` if listener
/// registration fails.
#[cfg(not(unix))]
pub async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
