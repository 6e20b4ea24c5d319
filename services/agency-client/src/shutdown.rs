//! Shutdown coordination
//!
//! A termination request from the OS cancels a single token. The session
//! observes the token at loop boundaries and during its timed waits, and
//! races every socket operation against it. Sockets and the bets file are
//! closed by the session's own cleanup step, never from the signal task.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{ClientError, Result};

/// Turns SIGTERM/SIGINT into a cooperative cancellation signal
#[derive(Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token handed to the session
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Request shutdown; every later check reports cancelled
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn the task that waits for a termination request
    pub fn listen(&self, agency_id: &str) -> JoinHandle<()> {
        let coordinator = self.clone();
        let agency_id = agency_id.to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = coordinator.token.cancelled() => {}
                res = wait_for_termination() => {
                    if let Err(e) = res {
                        error!(
                            action = "graceful_shutdown",
                            result = "fail",
                            client_id = %agency_id,
                            error = %e,
                            "Could not install signal handlers"
                        );
                        return;
                    }
                    info!(
                        action = "graceful_shutdown",
                        result = "in_progress",
                        client_id = %agency_id,
                        "Termination requested"
                    );
                    coordinator.trigger();
                }
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_termination() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Sleep for `period` unless cancelled first
///
/// Returns `true` when the full period elapsed.
pub async fn wait_or_cancel(token: &CancellationToken, period: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(period) => true,
    }
}

/// Run a socket operation, failing it if shutdown arrives first
///
/// The pending operation is dropped as if its socket had been closed under
/// it, and reported as a connection error.
pub async fn interruptible<F, T>(token: &CancellationToken, op: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ClientError::Connection(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "socket closed by shutdown",
        ))),
        res = op => res,
    }
}
