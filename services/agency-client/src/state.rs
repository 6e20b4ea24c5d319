//! Session phases and run outcome

use chrono::{DateTime, Utc};
use std::fmt;

/// Phase of an agency session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    Handshake,
    BatchLoop,
    Notify,
    WinnerPoll,
    Terminated,
}

/// What happened in the phase that just ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    Completed,
    Cancelled,
    Failed,
}

impl Phase {
    /// Next phase after `event`
    ///
    /// `Completed` walks the happy path; cancellation and failure both end the
    /// session. `Terminated` is absorbing.
    pub fn next(self, event: PhaseEvent) -> Phase {
        match (self, event) {
            (Phase::Terminated, _) => Phase::Terminated,
            (_, PhaseEvent::Cancelled) | (_, PhaseEvent::Failed) => Phase::Terminated,
            (Phase::Connecting, PhaseEvent::Completed) => Phase::Handshake,
            (Phase::Handshake, PhaseEvent::Completed) => Phase::BatchLoop,
            (Phase::BatchLoop, PhaseEvent::Completed) => Phase::Notify,
            (Phase::Notify, PhaseEvent::Completed) => Phase::WinnerPoll,
            (Phase::WinnerPoll, PhaseEvent::Completed) => Phase::Terminated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Connecting => "connecting",
            Phase::Handshake => "handshake",
            Phase::BatchLoop => "batch_loop",
            Phase::Notify => "notify",
            Phase::WinnerPoll => "winner_poll",
            Phase::Terminated => "terminated",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Winner list received
    Completed { winners: usize },
    /// Shutdown requested before the winner list was available
    Aborted,
}

/// Summary of one agency run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub agency_id: String,
    pub outcome: RunOutcome,
    pub bets_sent: usize,
    pub batches_sent: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn elapsed_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }

    pub fn winners(&self) -> Option<usize> {
        match self.outcome {
            RunOutcome::Completed { winners } => Some(winners),
            RunOutcome::Aborted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut phase = Phase::Connecting;
        let mut seen = vec![phase];
        while phase != Phase::Terminated {
            phase = phase.next(PhaseEvent::Completed);
            seen.push(phase);
        }

        assert_eq!(
            seen,
            vec![
                Phase::Connecting,
                Phase::Handshake,
                Phase::BatchLoop,
                Phase::Notify,
                Phase::WinnerPoll,
                Phase::Terminated,
            ]
        );
    }

    #[test]
    fn test_cancel_and_failure_terminate() {
        for phase in [
            Phase::Connecting,
            Phase::Handshake,
            Phase::BatchLoop,
            Phase::Notify,
            Phase::WinnerPoll,
        ] {
            assert_eq!(phase.next(PhaseEvent::Cancelled), Phase::Terminated);
            assert_eq!(phase.next(PhaseEvent::Failed), Phase::Terminated);
        }
    }

    #[test]
    fn test_display_matches_log_name() {
        assert_eq!(Phase::BatchLoop.to_string(), "batch_loop");
        assert_eq!(Phase::WinnerPoll.to_string(), Phase::WinnerPoll.as_str());
    }

    #[test]
    fn test_terminated_is_absorbing() {
        for event in [PhaseEvent::Completed, PhaseEvent::Cancelled, PhaseEvent::Failed] {
            assert_eq!(Phase::Terminated.next(event), Phase::Terminated);
        }
    }
}
