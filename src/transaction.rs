//! Bounded polling state machine for shared-register transactions.
//!
//! The indexer register is a bare, lock-free resource shared with any
//! number of unrelated clients. There is no per-client channel or token:
//! a transaction is claimed by writing the request word and completed by
//! observing the same word echoed back with the reply bit set. Everything
//! in between is handled by [`Polling`], which classifies each observed
//! word and tracks the retry budget and backoff schedule.
//!
//! The state machine is deliberately clockless: it decides *what* to do
//! about an observed word and *how long* the next backoff should be, while
//! the driver in [`Indexer`](crate::Indexer) owns the actual reads, writes
//! and sleeps. This keeps the race-detection and backoff policies
//! unit-testable without a bus or a clock.
//!
//! # Example
//!
//! ```
//! use pils_indexer::{InfoType, Polling, PollOutcome, Request};
//!
//! let request = Request::new(1, InfoType::Size);
//! let mut poll = Polling::new(request);
//!
//! // our own request word, not yet answered: keep waiting
//! assert_eq!(poll.observe(request.to_word()), PollOutcome::Pending);
//!
//! // a foreign word: another client owns the register, reclaim it
//! assert_eq!(poll.observe(0x0203), PollOutcome::RaceDetected);
//!
//! // the echoed reply: done
//! assert_eq!(poll.observe(request.to_word() | 0x8000), PollOutcome::Matched);
//! ```

use std::time::Duration;

use crate::protocol::Request;

/// Retry budget: number of register reads before a transaction times out.
pub const MAX_POLL_ATTEMPTS: u32 = 32;

/// Default unit step of the quadratic backoff schedule.
pub const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(1);

/// Classification of a word observed in the shared register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The word is the valid reply to our request.
    Matched,
    /// The word belongs to a different requester's transaction; our
    /// request must be re-written to reclaim the register.
    RaceDetected,
    /// The word is our own request, still unanswered; keep polling.
    Pending,
}

/// Per-transaction polling state: the request being matched and the
/// number of reads performed so far.
#[derive(Debug, Clone, Copy)]
pub struct Polling {
    request: Request,
    attempts: u32,
}

impl Polling {
    /// Starts polling for the reply to `request`.
    pub fn new(request: Request) -> Self {
        Self {
            request,
            attempts: 0,
        }
    }

    /// Classifies the leading word of a register read and consumes one
    /// attempt from the budget.
    pub fn observe(&mut self, word: u16) -> PollOutcome {
        self.attempts += 1;
        if self.request.matches_reply(word) {
            PollOutcome::Matched
        } else if self.request.is_foreign(word) {
            PollOutcome::RaceDetected
        } else {
            PollOutcome::Pending
        }
    }

    /// Returns whether the retry budget is used up.
    pub fn exhausted(&self) -> bool {
        self.attempts >= MAX_POLL_ATTEMPTS
    }

    /// Returns the delay before the next read.
    ///
    /// The schedule is quadratic in the attempt index: after read `k`
    /// (1-based) the delay is `step * (k - 1)^2`, so the first retry
    /// follows immediately and contention backs off progressively instead
    /// of spinning.
    pub fn backoff(&self, step: Duration) -> Duration {
        step * self.attempts.saturating_sub(1).pow(2)
    }

    /// Returns the number of reads performed so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
