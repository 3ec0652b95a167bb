//! Termination signal handling
//!
//! SIGINT and SIGTERM both request a graceful stop: the orchestrator cancels
//! the reader, drains the channel and closes the publisher before exiting.

use std::fmt;
use std::io;
use tracing::info;

/// The signal that ended the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT (Ctrl+C)
    Interrupt,
    /// SIGTERM (kill, container runtime)
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Wait for SIGINT or SIGTERM.
///
/// Fails only when a handler cannot be installed.
#[cfg(unix)]
pub async fn shutdown_signal() -> io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let received = tokio::select! {
        _ = sigterm.recv() => ShutdownSignal::Terminate,
        _ = sigint.recv() => ShutdownSignal::Interrupt,
    };
    info!(signal = %received, "Received termination signal");
    Ok(received)
}

#[cfg(not(unix))]
pub async fn shutdown_signal() -> io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    info!(signal = %ShutdownSignal::Interrupt, "Received termination signal");
    Ok(ShutdownSignal::Interrupt)
}
