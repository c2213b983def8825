//! Flush Coordinator state
//!
//! Bookkeeping shared between callers and the flush worker. It lives inside
//! the log's single mutex; the two condition variables that go with it are
//! owned by `LogShared`.
//!
//! Rounds are numbered. A caller that needs a flush takes a ticket
//! (`request_round`) and waits until `completed_round >= ticket`, which
//! survives spurious wakeups and any number of concurrent waiters.

use std::io;

use crate::error::{LogError, Result};

/// What the flush worker is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerState {
    #[default]
    Idle,
    Flushing,
    Exiting,
}

#[derive(Debug)]
struct RoundFailure {
    round: u64,
    kind: io::ErrorKind,
    message: String,
}

/// Flags and round counters for the worker protocol
#[derive(Debug, Default)]
pub(crate) struct Coordinator {
    state: WorkerState,
    flush_requested: bool,
    should_exit: bool,
    /// Highest ticket handed out to a waiting caller
    requested_round: u64,
    /// Highest round the worker has finished, successfully or not
    completed_round: u64,
    /// Highest round that drained the buffer without error
    succeeded_round: u64,
    failure: Option<RoundFailure>,
    rounds_run: u64,
    rounds_failed: u64,
}

impl Coordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> WorkerState {
        self.state
    }

    /// An append left bytes pending; no one waits for them
    pub(crate) fn notify_append(&mut self) {
        self.flush_requested = true;
    }

    /// Ask for a full flush round and return the ticket to wait on
    pub(crate) fn request_round(&mut self) -> u64 {
        self.requested_round += 1;
        self.flush_requested = true;
        self.requested_round
    }

    /// Ask the worker to drain one last time and stop; returns that round's ticket
    pub(crate) fn request_exit(&mut self) -> u64 {
        self.should_exit = true;
        self.request_round()
    }

    pub(crate) fn has_work(&self) -> bool {
        self.flush_requested || self.should_exit
    }

    pub(crate) fn should_exit(&self) -> bool {
        self.should_exit
    }

    /// Idle → Flushing. The returned round covers every ticket issued so far.
    pub(crate) fn begin_round(&mut self) -> u64 {
        self.state = WorkerState::Flushing;
        self.flush_requested = false;
        self.requested_round
    }

    /// Flushing → Idle, recording the round's error if it failed
    pub(crate) fn finish_round(&mut self, round: u64, failure: Option<&LogError>) {
        self.rounds_run += 1;
        self.completed_round = self.completed_round.max(round);
        match failure {
            None => {
                self.succeeded_round = self.succeeded_round.max(round);
                self.failure = None;
            }
            Some(err) => {
                self.rounds_failed += 1;
                let kind = match err {
                    LogError::Io(e) => e.kind(),
                    _ => io::ErrorKind::Other,
                };
                self.failure = Some(RoundFailure {
                    round,
                    kind,
                    message: err.to_string(),
                });
            }
        }
        self.state = WorkerState::Idle;
    }

    /// The worker is gone; no further rounds will complete
    pub(crate) fn mark_exited(&mut self) {
        self.state = WorkerState::Exiting;
    }

    pub(crate) fn is_exited(&self) -> bool {
        self.state == WorkerState::Exiting
    }

    pub(crate) fn round_done(&self, ticket: u64) -> bool {
        self.completed_round >= ticket
    }

    /// Outcome for a caller holding `ticket`, once `round_done(ticket)`
    pub(crate) fn round_result(&self, ticket: u64) -> Result<()> {
        if self.succeeded_round >= ticket {
            return Ok(());
        }
        match &self.failure {
            Some(failure) => Err(LogError::Io(io::Error::new(
                failure.kind,
                format!("flush round {} failed: {}", failure.round, failure.message),
            ))),
            None => Err(LogError::WorkerStopped),
        }
    }

    pub(crate) fn rounds_run(&self) -> u64 {
        self.rounds_run
    }

    pub(crate) fn rounds_failed(&self) -> u64 {
        self.rounds_failed
    }
}
