use std::collections::BTreeMap;
use std::fmt;

/// Handle for a scheduled callback, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerToken(u64);

/// Deferred-callback facility the host provides.
///
/// Callbacks must fire on the thread that drives tree evaluation. Nodes only use them to flip
/// shared flags, never to touch the tree directly.
pub trait TimerFacility {
    /// Current time in seconds.
    fn now(&self) -> f64;

    fn schedule(&mut self, delay_seconds: f64, callback: Box<dyn FnOnce()>) -> TimerToken;

    /// Returns `false` if the token already fired or was cancelled.
    fn cancel(&mut self, token: TimerToken) -> bool;
}

struct Pending {
    deadline: f64,
    callback: Box<dyn FnOnce()>,
}

/// Timer driven explicitly by the host (or a test): time only moves on `advance`.
#[derive(Default)]
pub struct ManualTimer {
    now: f64,
    next_token: u64,
    pending: BTreeMap<TimerToken, Pending>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn advance(&mut self, dt_seconds: f64) -> usize {
        self.advance_to(self.now + dt_seconds.max(0.0))
    }

    /// Move the clock to `t` (never backwards) and fire everything now due, earliest first.
    /// Returns the number of callbacks fired.
    pub fn advance_to(&mut self, t: f64) -> usize {
        if t > self.now {
            self.now = t;
        }

        let mut due: Vec<(f64, TimerToken)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= self.now)
            .map(|(token, p)| (p.deadline, *token))
            .collect();
        due.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut fired = 0;
        for (_, token) in due {
            if let Some(pending) = self.pending.remove(&token) {
                (pending.callback)();
                fired += 1;
            }
        }
        if fired > 0 {
            tracing::trace!(now = self.now, fired, "timer callbacks fired");
        }
        fired
    }
}

impl TimerFacility for ManualTimer {
    fn now(&self) -> f64 {
        self.now
    }

    fn schedule(&mut self, delay_seconds: f64, callback: Box<dyn FnOnce()>) -> TimerToken {
        let token = TimerToken(self.next_token);
        self.next_token += 1;
        self.pending.insert(
            token,
            Pending {
                deadline: self.now + delay_seconds.max(0.0),
                callback,
            },
        );
        token
    }

    fn cancel(&mut self, token: TimerToken) -> bool {
        self.pending.remove(&token).is_some()
    }
}

impl fmt::Debug for ManualTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTimer")
            .field("now", &self.now)
            .field("pending", &self.pending.len())
            .finish()
    }
}
