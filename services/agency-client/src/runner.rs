//! Agency Runner - submission and winner polling session

use chrono::Utc;
use std::io;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::client::{self, ServerConnection, WinnersReply};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::reader::BatchReader;
use crate::shutdown::{interruptible, wait_or_cancel};
use crate::state::{Phase, PhaseEvent, RunOutcome, RunReport};

/// Drives one agency through the whole protocol
pub struct AgencyRunner {
    config: ClientConfig,
    reader: BatchReader,
    shutdown: CancellationToken,
    connection: Option<ServerConnection<TcpStream>>,
    phase: Phase,
    outcome: RunOutcome,
    bets_sent: usize,
    batches_sent: usize,
}

impl AgencyRunner {
    pub fn new(config: ClientConfig, reader: BatchReader, shutdown: CancellationToken) -> Self {
        Self {
            config,
            reader,
            shutdown,
            connection: None,
            phase: Phase::Connecting,
            outcome: RunOutcome::Aborted,
            bets_sent: 0,
            batches_sent: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn reader(&self) -> &BatchReader {
        &self.reader
    }

    /// Run every phase until the session terminates
    ///
    /// Resources are released before returning, whether the run completed,
    /// was cancelled or failed.
    pub async fn run(&mut self) -> Result<RunReport> {
        let started_at = Utc::now();
        let result = self.drive().await;
        self.terminate().await;

        let outcome = result?;
        let report = RunReport {
            agency_id: self.config.id.clone(),
            outcome,
            bets_sent: self.bets_sent,
            batches_sent: self.batches_sent,
            started_at,
            finished_at: Utc::now(),
        };

        match outcome {
            RunOutcome::Completed { winners } => info!(
                action = "run_finished",
                result = "success",
                client_id = %self.config.id,
                bets = report.bets_sent,
                batches = report.batches_sent,
                winners,
                elapsed_ms = report.elapsed_ms(),
                "Agency run finished"
            ),
            RunOutcome::Aborted => info!(
                action = "run_finished",
                result = "aborted",
                client_id = %self.config.id,
                bets = report.bets_sent,
                batches = report.batches_sent,
                elapsed_ms = report.elapsed_ms(),
                "Agency run aborted by shutdown"
            ),
        }

        Ok(report)
    }

    async fn drive(&mut self) -> Result<RunOutcome> {
        while self.phase != Phase::Terminated {
            let event = match self.step().await {
                Ok(event) => event,
                Err(e) => {
                    error!(
                        action = self.phase.as_str(),
                        result = "fail",
                        client_id = %self.config.id,
                        error = %e,
                        "Phase failed"
                    );
                    self.phase = self.phase.next(PhaseEvent::Failed);
                    return Err(e);
                }
            };

            let next = self.phase.next(event);
            let result = match event {
                PhaseEvent::Cancelled => "cancelled",
                _ => "success",
            };
            info!(
                action = self.phase.as_str(),
                result,
                client_id = %self.config.id,
                next = %next,
                "Phase finished"
            );
            self.phase = next;
        }
        Ok(self.outcome)
    }

    async fn step(&mut self) -> Result<PhaseEvent> {
        if self.shutdown.is_cancelled() {
            info!(
                action = "graceful_shutdown",
                result = "success",
                client_id = %self.config.id,
                phase = %self.phase,
                "Shutdown observed"
            );
            return Ok(PhaseEvent::Cancelled);
        }

        match self.phase {
            Phase::Connecting => {
                let conn = interruptible(
                    &self.shutdown,
                    client::connect(&self.config.server_address, &self.config.id),
                )
                .await?;
                self.connection = Some(conn);
                Ok(PhaseEvent::Completed)
            }
            Phase::Handshake => {
                let token = self.shutdown.clone();
                let conn = self.connection_mut()?;
                interruptible(&token, conn.handshake()).await?;
                Ok(PhaseEvent::Completed)
            }
            Phase::BatchLoop => self.submit_batches().await,
            Phase::Notify => {
                let token = self.shutdown.clone();
                let conn = self.connection_mut()?;
                interruptible(&token, conn.notify_end()).await?;
                self.close_connection().await;
                Ok(PhaseEvent::Completed)
            }
            Phase::WinnerPoll => self.poll_winners().await,
            Phase::Terminated => Ok(PhaseEvent::Completed),
        }
    }

    /// Send every batch of the bets file, one confirmation at a time
    async fn submit_batches(&mut self) -> Result<PhaseEvent> {
        let token = self.shutdown.clone();
        loop {
            if token.is_cancelled() {
                return Ok(PhaseEvent::Cancelled);
            }

            let batch = self.reader.read().await?;
            if batch.is_empty() {
                info!(
                    action = "bets_file_exhausted",
                    result = "success",
                    client_id = %self.config.id,
                    bets = self.bets_sent,
                    batches = self.batches_sent,
                    "All bets submitted"
                );
                return Ok(PhaseEvent::Completed);
            }

            if !wait_or_cancel(&token, self.config.loop_period()).await {
                return Ok(PhaseEvent::Cancelled);
            }

            let conn = self.connection_mut()?;
            interruptible(&token, conn.send_batch(&batch)).await?;

            self.bets_sent += batch.len();
            self.batches_sent += 1;
            info!(
                action = "batch_sent",
                result = "success",
                client_id = %self.config.id,
                bets = batch.len(),
                batch = self.batches_sent,
                "Batch stored by server"
            );
        }
    }

    /// Ask for the winner list until the server has it
    ///
    /// Every round uses a fresh connection. The server closes without a
    /// reply while other agencies are still submitting.
    async fn poll_winners(&mut self) -> Result<PhaseEvent> {
        let token = self.shutdown.clone();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.close_connection().await;

            let conn = interruptible(
                &token,
                client::connect(&self.config.server_address, &self.config.id),
            )
            .await?;
            let conn = self.connection.insert(conn);
            interruptible(&token, conn.handshake()).await?;

            match interruptible(&token, conn.request_winners()).await? {
                WinnersReply::Ready(winners) => {
                    self.close_connection().await;
                    info!(
                        action = "winners_query",
                        result = "success",
                        client_id = %self.config.id,
                        winners = winners.len(),
                        attempts = attempt,
                        "Winner list received"
                    );
                    self.outcome = RunOutcome::Completed {
                        winners: winners.len(),
                    };
                    return Ok(PhaseEvent::Completed);
                }
                WinnersReply::NotReady => {
                    self.close_connection().await;
                    debug!(
                        action = "winners_query",
                        result = "not_ready",
                        client_id = %self.config.id,
                        attempt,
                        backoff_ms = self.config.winners_backoff_ms,
                        "Winner list not ready"
                    );
                    if !wait_or_cancel(&token, self.config.winners_backoff()).await {
                        warn!(
                            action = "winners_query",
                            result = "aborted",
                            client_id = %self.config.id,
                            attempts = attempt,
                            "Winner query aborted by shutdown"
                        );
                        return Ok(PhaseEvent::Cancelled);
                    }
                }
            }
        }
    }

    fn connection_mut(&mut self) -> Result<&mut ServerConnection<TcpStream>> {
        self.connection.as_mut().ok_or_else(|| {
            ClientError::Connection(io::Error::new(
                io::ErrorKind::NotConnected,
                "no open server connection",
            ))
        })
    }

    async fn close_connection(&mut self) {
        if let Some(conn) = self.connection.take() {
            conn.close().await;
            debug!(client_id = %self.config.id, "Closed server connection");
        }
    }

    /// Release the socket and the bets file; safe to call more than once
    pub async fn terminate(&mut self) {
        self.close_connection().await;
        self.reader.close();
        self.phase = Phase::Terminated;
    }
}
