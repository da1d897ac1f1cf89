//! Turn deadline for a room actor.
//!
//! A [`TurnClock`] holds at most one pending deadline. Arming it replaces
//! whatever was pending; cancelling clears it. [`TurnClock::expired`] waits
//! for the deadline and pends forever while nothing is armed, so it can sit
//! in the room actor's `tokio::select!` loop next to the command channel:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* apply command, then re-sync the clock */ }
//!         expiry = clock.expired() => {
//!             if expiry.generation == game.turn_serial() { /* auto-play */ }
//!         }
//!     }
//! }
//! ```
//!
//! # Generations
//!
//! Every deadline is armed with a generation number, the room's turn serial
//! at the time. The actor compares it against the current serial when the
//! deadline fires; a mismatch means the turn already moved on and the
//! expiry is ignored.
//!
//! Because the clock is owned by the actor and polled only from its loop, a
//! cancel can never race a firing deadline: once `cancel` returns, the old
//! deadline is gone.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

/// A pending deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Deadline {
    at: Instant,
    generation: u64,
    duration: Duration,
}

/// Returned by [`TurnClock::expired`] when a deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    /// The generation the deadline was armed with.
    pub generation: u64,
    /// The full duration it was armed for.
    pub duration: Duration,
    /// How far past the deadline the actor got around to it.
    pub late_by: Duration,
}

/// Counters for one clock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockMetrics {
    pub armed: u64,
    pub fired: u64,
    pub cancelled: u64,
    /// Arms that replaced a still-pending deadline.
    pub replaced: u64,
}

/// One room's turn clock.
#[derive(Debug, Default)]
pub struct TurnClock {
    pending: Option<Deadline>,
    metrics: ClockMetrics,
}

impl TurnClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a deadline `duration` from now, replacing any pending one.
    pub fn arm(&mut self, duration: Duration, generation: u64) {
        if self.pending.is_some() {
            self.metrics.replaced += 1;
        }
        self.pending = Some(Deadline {
            at: Instant::now() + duration,
            generation,
            duration,
        });
        self.metrics.armed += 1;
        trace!(generation, secs = duration.as_secs_f64(), "turn clock armed");
    }

    /// Clears the pending deadline. Returns `true` if one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(d) => {
                self.metrics.cancelled += 1;
                trace!(generation = d.generation, "turn clock cancelled");
                true
            }
            None => false,
        }
    }

    /// Waits for the pending deadline, then disarms and returns it.
    ///
    /// Pends forever while disarmed. Cancel-safe: dropping the future (as
    /// `select!` does when another branch wins) leaves the deadline armed.
    pub async fn expired(&mut self) -> Expiry {
        let Some(deadline) = self.pending else {
            std::future::pending::<()>().await;
            unreachable!("pending() never resolves");
        };

        time::sleep_until(deadline.at).await;

        self.pending = None;
        self.metrics.fired += 1;
        let late_by = Instant::now().saturating_duration_since(deadline.at);
        debug!(
            generation = deadline.generation,
            late_ms = late_by.as_millis() as u64,
            "turn clock fired"
        );
        Expiry {
            generation: deadline.generation,
            duration: deadline.duration,
            late_by,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Generation of the pending deadline.
    pub fn generation(&self) -> Option<u64> {
        self.pending.map(|d| d.generation)
    }

    /// Time left before the pending deadline fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending
            .map(|d| d.at.saturating_duration_since(Instant::now()))
    }

    pub fn metrics(&self) -> &ClockMetrics {
        &self.metrics
    }
}
