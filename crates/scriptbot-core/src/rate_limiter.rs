//! Per-identity sliding-window rate limiter.
//!
//! Each identity gets an ordered queue of the instants of its admitted
//! requests. A check trims entries that have left the trailing window,
//! rejects if `limit` entries remain, and otherwise records `now`.
//! The owner bypasses the limiter entirely.
//!
//! The whole trim/decide/append sequence runs under a single mutex, so
//! two concurrent checks can never both take the last free slot.
//! State is volatile and self-trims on access; there is no sweeper.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use scriptbot_types::{Identity, Result, ScriptbotError};

// ---------------------------------------------------------------------------
// RateDecision
// ---------------------------------------------------------------------------

/// Outcome of a rate check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    /// The request is admitted and has been recorded.
    Admit,
    /// The window is full. Nothing was recorded.
    Reject {
        /// Time until the oldest recorded request leaves the window.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Returns `true` for [`RateDecision::Admit`].
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admit)
    }

    /// Converts a rejection into [`ScriptbotError::RateLimited`].
    ///
    /// The countdown is rounded up to whole seconds so a rejected caller
    /// is never told to retry in "0 seconds" while still blocked.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Admit => Ok(()),
            Self::Reject { retry_after } => Err(ScriptbotError::RateLimited {
                retry_after_secs: whole_secs_ceil(retry_after),
            }),
        }
    }
}

fn whole_secs_ceil(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

// ---------------------------------------------------------------------------
// RateLimiter
// ---------------------------------------------------------------------------

/// Thread-safe, per-identity sliding-window limiter.
pub struct RateLimiter {
    windows: Mutex<HashMap<Identity, VecDeque<Instant>>>,
    limit: usize,
    window: Duration,
    owner: Identity,
}

impl RateLimiter {
    /// Creates a limiter admitting `limit` requests per `window`.
    ///
    /// `owner` is never limited.
    pub fn new(limit: u32, window: Duration, owner: Identity) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            limit: limit as usize,
            window,
            owner,
        }
    }

    /// Checks a request from `identity` at the current instant.
    pub fn check(&self, identity: &Identity) -> Result<RateDecision> {
        self.check_at(identity, Instant::now())
    }

    /// Checks a request from `identity` at `now`.
    ///
    /// `now` must not go backwards between calls for the same identity.
    pub fn check_at(&self, identity: &Identity, now: Instant) -> Result<RateDecision> {
        if *identity == self.owner {
            return Ok(RateDecision::Admit);
        }

        let mut windows = self.windows.lock().map_err(|_| ScriptbotError::InternalError {
            reason: "rate limiter lock poisoned".into(),
        })?;

        let window = windows
            .entry(*identity)
            .or_insert_with(|| VecDeque::with_capacity(self.limit));

        while let Some(oldest) = window.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.limit {
            let retry_after = match window.front() {
                Some(oldest) => self
                    .window
                    .saturating_sub(now.saturating_duration_since(*oldest)),
                None => Duration::ZERO,
            };
            tracing::debug!(%identity, ?retry_after, "rate limit reached");
            return Ok(RateDecision::Reject { retry_after });
        }

        window.push_back(now);
        Ok(RateDecision::Admit)
    }

    /// Number of recorded requests for `identity` still inside the
    /// window as of its last check.
    pub fn recorded(&self, identity: &Identity) -> usize {
        self.windows
            .lock()
            .map(|w| w.get(identity).map_or(0, VecDeque::len))
            .unwrap_or(0)
    }

    /// Returns the number of identities with a window.
    ///
    /// Useful for monitoring and tests.
    pub fn tracked_identities(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
