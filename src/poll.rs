//! # Bounded Polling
//!
//! The renderer lays out asynchronously, so the bar handles the orchestrator
//! needs appear some time after a render call. `PollUntil` retries a check at
//! a fixed interval until it succeeds, the attempt budget runs out, or a newer
//! operation cancels it.
//!
//! Polling is driven by the host's timer: each `step(now, check)` either
//! waits, runs the check once, or finishes. Nothing here sleeps or spawns.
//!
//! ## Cancellation
//! `RunGuard::begin` hands out a `RunToken` and invalidates every token handed
//! out before it. A task whose token is stale finishes as `Cancelled` on its
//! next step without running the check.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

/// Issues run tokens; only the most recent one is current.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    latest: Rc<Cell<u64>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new run, cancelling all earlier ones.
    pub fn begin(&self) -> RunToken {
        let id = self.latest.get() + 1;
        self.latest.set(id);
        RunToken {
            id,
            latest: Rc::clone(&self.latest),
        }
    }

    /// Cancel every outstanding run without starting a new one.
    pub fn cancel_all(&self) {
        self.latest.set(self.latest.get() + 1);
    }
}

#[derive(Debug, Clone)]
pub struct RunToken {
    id: u64,
    latest: Rc<Cell<u64>>,
}

impl RunToken {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_current(&self) -> bool {
        self.latest.get() == self.id
    }
}

/// Attempt budget for one polling task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    /// Waiting on the renderer: 120 attempts, 50 ms apart
    pub const RENDER: RetryPolicy = RetryPolicy {
        max_attempts: 120,
        interval: Duration::from_millis(50),
    };
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::RENDER
    }
}

/// Outcome of one polling step
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep<T> {
    /// Not due yet, or the check came back empty with attempts left
    Waiting,
    Ready(T),
    Exhausted,
    Cancelled,
}

impl<T> PollStep<T> {
    /// True once the task should be dropped
    pub fn is_finished(&self) -> bool {
        !matches!(self, PollStep::Waiting)
    }
}

/// Retry state for one check
#[derive(Debug, Clone)]
pub struct PollUntil {
    token: RunToken,
    policy: RetryPolicy,
    attempts: u32,
    next_at: Duration,
}

impl PollUntil {
    /// The first attempt is due immediately at `now`.
    pub fn new(token: RunToken, policy: RetryPolicy, now: Duration) -> Self {
        Self {
            token,
            policy,
            attempts: 0,
            next_at: now,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn step<T, F>(&mut self, now: Duration, check: F) -> PollStep<T>
    where
        F: FnOnce() -> Option<T>,
    {
        if !self.token.is_current() {
            debug!(run = self.token.id(), "poll cancelled by a newer run");
            return PollStep::Cancelled;
        }
        if self.attempts >= self.policy.max_attempts {
            return PollStep::Exhausted;
        }
        if now < self.next_at {
            return PollStep::Waiting;
        }

        self.attempts += 1;
        if let Some(value) = check() {
            return PollStep::Ready(value);
        }
        if self.attempts >= self.policy.max_attempts {
            debug!(
                run = self.token.id(),
                attempts = self.attempts,
                "poll gave up"
            );
            return PollStep::Exhausted;
        }
        self.next_at = now + self.policy.interval;
        PollStep::Waiting
    }
}

/// Poll to completion, calling `sleep` between attempts.
pub fn poll_until<T, P, S>(
    mut check: P,
    policy: RetryPolicy,
    token: &RunToken,
    mut sleep: S,
) -> PollStep<T>
where
    P: FnMut() -> Option<T>,
    S: FnMut(Duration),
{
    let mut poll = PollUntil::new(token.clone(), policy, Duration::ZERO);
    let mut now = Duration::ZERO;
    loop {
        match poll.step(now, &mut check) {
            PollStep::Waiting => {
                sleep(policy.interval);
                now += policy.interval;
            }
            finished => return finished,
        }
    }
}
