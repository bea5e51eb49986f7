//! Interval-driven side-effect nodes attached to a composite or decorator.
//!
//! A service ticks while its host node is started, independent of what the host returns. It
//! never contributes to Success/Failure; it exists to keep blackboard values fresh.

use std::fmt;

use catalyst_core::BbValue;
use catalyst_tools::{TraceEvent, TraceKind};

use crate::context::{NodeId, TickContext};

/// The work a service performs each time its interval elapses.
pub trait ServiceTask: 'static {
    fn kind(&self) -> &'static str;

    fn run(&mut self, ctx: &mut TickContext<'_>);

    fn clone_task(&self) -> Box<dyn ServiceTask>;
}

pub struct ServiceNode {
    interval: f64,
    last_fired: Option<f64>,
    task: Box<dyn ServiceTask>,
}

impl ServiceNode {
    pub fn new(interval_seconds: f64, task: impl ServiceTask) -> Self {
        Self::from_boxed(interval_seconds, Box::new(task))
    }

    pub fn from_boxed(interval_seconds: f64, task: Box<dyn ServiceTask>) -> Self {
        Self {
            interval: interval_seconds.max(0.0),
            last_fired: None,
            task,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn kind(&self) -> &'static str {
        self.task.kind()
    }

    pub fn last_fired(&self) -> Option<f64> {
        self.last_fired
    }

    /// Host node became active: the next `tick_service` fires immediately.
    pub(crate) fn activate(&mut self) {
        self.last_fired = None;
    }

    /// Runs the task if the interval has elapsed since it last fired. Returns whether it ran.
    pub fn tick_service(&mut self, host: NodeId, ctx: &mut TickContext<'_>) -> bool {
        let now = ctx.now();
        let due = match self.last_fired {
            None => true,
            Some(last) => now - last >= self.interval,
        };
        if !due {
            return false;
        }

        self.last_fired = Some(now);
        self.task.run(ctx);
        if ctx.is_tracing() {
            ctx.emit(TraceEvent::new(
                ctx.tick(),
                TraceKind::ServiceTick,
                host.index(),
                self.task.kind(),
            ));
        }
        true
    }
}

impl Clone for ServiceNode {
    fn clone(&self) -> Self {
        Self {
            interval: self.interval,
            last_fired: None,
            task: self.task.clone_task(),
        }
    }
}

impl fmt::Debug for ServiceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceNode")
            .field("kind", &self.task.kind())
            .field("interval", &self.interval)
            .field("last_fired", &self.last_fired)
            .finish()
    }
}

/// Recomputes a scalar into `key`; `None` removes the key.
///
/// The usual shape for "closest target" / "distance to target" style services: the closure
/// reads the owner and blackboard and produces the fresh value.
#[derive(Clone)]
pub struct ComputeService<F> {
    key: String,
    compute: F,
}

impl<F> ComputeService<F>
where
    F: FnMut(&TickContext<'_>) -> Option<BbValue> + Clone + 'static,
{
    pub fn new(key: impl Into<String>, compute: F) -> Self {
        Self {
            key: key.into(),
            compute,
        }
    }
}

impl<F> ServiceTask for ComputeService<F>
where
    F: FnMut(&TickContext<'_>) -> Option<BbValue> + Clone + 'static,
{
    fn kind(&self) -> &'static str {
        "compute"
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        match (self.compute)(ctx) {
            Some(value) => value.write(ctx.blackboard, &self.key),
            None => {
                ctx.blackboard.remove(&self.key);
            }
        }
    }

    fn clone_task(&self) -> Box<dyn ServiceTask> {
        Box::new(self.clone())
    }
}

/// Writes the current time (seconds, `f64`) into `key`.
#[derive(Debug, Clone)]
pub struct TimestampService {
    key: String,
}

impl TimestampService {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl ServiceTask for TimestampService {
    fn kind(&self) -> &'static str {
        "timestamp"
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        let now = ctx.now();
        ctx.blackboard.set(&self.key, now);
    }

    fn clone_task(&self) -> Box<dyn ServiceTask> {
        Box::new(self.clone())
    }
}

/// Adds `step` to the `i64` at `key`, starting from zero when absent or mistyped.
#[derive(Debug, Clone)]
pub struct CounterService {
    key: String,
    step: i64,
}

impl CounterService {
    pub fn new(key: impl Into<String>, step: i64) -> Self {
        Self {
            key: key.into(),
            step,
        }
    }
}

impl ServiceTask for CounterService {
    fn kind(&self) -> &'static str {
        "counter"
    }

    fn run(&mut self, ctx: &mut TickContext<'_>) {
        let current = ctx.blackboard.try_get::<i64>(&self.key).copied().unwrap_or(0);
        ctx.blackboard
            .set(&self.key, current.saturating_add(self.step));
    }

    fn clone_task(&self) -> Box<dyn ServiceTask> {
        Box::new(self.clone())
    }
}
