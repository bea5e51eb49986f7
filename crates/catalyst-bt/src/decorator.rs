//! Single-child wrappers that transform or gate the child's result.
//!
//! Every decorator tolerates a missing child and resolves to a fixed state instead; the table
//! of defaults lives on each type.

use std::cell::Cell;
use std::rc::Rc;

use catalyst_core::TimerToken;

use crate::context::TickContext;
use crate::node::{clone_child, visit_child, visit_child_mut, Node, NodeCore, NodeState};

macro_rules! decorator_plumbing {
    ($kind:literal) => {
        fn core(&self) -> &NodeCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut NodeCore {
            &mut self.core
        }

        fn kind(&self) -> &'static str {
            $kind
        }

        fn for_each_child(&self, f: &mut dyn FnMut(&dyn Node)) {
            visit_child(&self.child, f);
        }

        fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut dyn Node)) {
            visit_child_mut(&mut self.child, f);
        }
    };
}

/// Swaps Success and Failure. No child: Failure.
pub struct Inverter {
    core: NodeCore,
    child: Option<Box<dyn Node>>,
}

impl Inverter {
    pub fn new(child: Option<Box<dyn Node>>) -> Self {
        Self {
            core: NodeCore::new(),
            child,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for Inverter {
    decorator_plumbing!("inverter");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(clone_child(&self.child)).with_core(self.core.clone()))
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        let Some(child) = self.child.as_mut() else {
            return NodeState::Failure;
        };
        match child.evaluate(ctx) {
            NodeState::Running => NodeState::Running,
            NodeState::Success => NodeState::Failure,
            NodeState::Failure => NodeState::Success,
        }
    }
}

/// Any terminal child result becomes Success. No child: Success.
pub struct Succeeder {
    core: NodeCore,
    child: Option<Box<dyn Node>>,
}

impl Succeeder {
    pub fn new(child: Option<Box<dyn Node>>) -> Self {
        Self {
            core: NodeCore::new(),
            child,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for Succeeder {
    decorator_plumbing!("succeeder");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(clone_child(&self.child)).with_core(self.core.clone()))
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        match self.child.as_mut().map(|c| c.evaluate(ctx)) {
            Some(NodeState::Running) => NodeState::Running,
            _ => NodeState::Success,
        }
    }
}

/// Any terminal child result becomes Failure. No child: Failure.
pub struct Failer {
    core: NodeCore,
    child: Option<Box<dyn Node>>,
}

impl Failer {
    pub fn new(child: Option<Box<dyn Node>>) -> Self {
        Self {
            core: NodeCore::new(),
            child,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for Failer {
    decorator_plumbing!("failer");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(clone_child(&self.child)).with_core(self.core.clone()))
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        match self.child.as_mut().map(|c| c.evaluate(ctx)) {
            Some(NodeState::Running) => NodeState::Running,
            _ => NodeState::Failure,
        }
    }
}

/// Re-runs the child `repeat_count` times (0 = forever), one run per tick at most.
///
/// With `stop_on_failure`, a failing run ends the repeater with Failure. No child: Failure.
pub struct Repeater {
    core: NodeCore,
    child: Option<Box<dyn Node>>,
    repeat_count: u32,
    stop_on_failure: bool,
    completed: u32,
}

impl Repeater {
    pub fn new(child: Option<Box<dyn Node>>, repeat_count: u32, stop_on_failure: bool) -> Self {
        Self {
            core: NodeCore::new(),
            child,
            repeat_count,
            stop_on_failure,
            completed: 0,
        }
    }

    pub fn forever(child: Box<dyn Node>) -> Self {
        Self::new(Some(child), 0, false)
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }

    /// Runs finished during the current activation.
    pub fn completed(&self) -> u32 {
        self.completed
    }
}

impl Node for Repeater {
    decorator_plumbing!("repeater");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(
            Self::new(
                clone_child(&self.child),
                self.repeat_count,
                self.stop_on_failure,
            )
            .with_core(self.core.clone()),
        )
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.completed = 0;
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        let Some(child) = self.child.as_mut() else {
            return NodeState::Failure;
        };
        let state = child.evaluate(ctx);
        match state {
            NodeState::Running => NodeState::Running,
            NodeState::Failure if self.stop_on_failure => NodeState::Failure,
            _ => {
                // the child reset its own started flag, so the next run goes through on_start
                self.completed = self.completed.saturating_add(1);
                if self.repeat_count != 0 && self.completed >= self.repeat_count {
                    NodeState::Success
                } else {
                    NodeState::Running
                }
            }
        }
    }
}

/// Loops the child until it fails, then succeeds. No child: Failure.
pub struct UntilFail {
    core: NodeCore,
    child: Option<Box<dyn Node>>,
}

impl UntilFail {
    pub fn new(child: Option<Box<dyn Node>>) -> Self {
        Self {
            core: NodeCore::new(),
            child,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for UntilFail {
    decorator_plumbing!("until_fail");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(clone_child(&self.child)).with_core(self.core.clone()))
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        let Some(child) = self.child.as_mut() else {
            return NodeState::Failure;
        };
        match child.evaluate(ctx) {
            NodeState::Failure => NodeState::Success,
            _ => NodeState::Running,
        }
    }
}

/// After the child finishes, refuses to run it again for `duration` seconds.
///
/// While cooling down the node returns `cooldown_state` without touching the child. The
/// cooldown is driven by the timer facility and survives aborts. No child: Failure.
pub struct Cooldown {
    core: NodeCore,
    child: Option<Box<dyn Node>>,
    duration: f64,
    cooldown_state: NodeState,
    cooling: Rc<Cell<bool>>,
}

impl Cooldown {
    pub fn new(child: Option<Box<dyn Node>>, duration: f64, cooldown_state: NodeState) -> Self {
        Self {
            core: NodeCore::new(),
            child,
            duration,
            cooldown_state,
            cooling: Rc::new(Cell::new(false)),
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }

    pub fn is_cooling_down(&self) -> bool {
        self.cooling.get()
    }
}

impl Node for Cooldown {
    decorator_plumbing!("cooldown");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(
            Self::new(clone_child(&self.child), self.duration, self.cooldown_state)
                .with_core(self.core.clone()),
        )
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        if self.cooling.get() {
            return self.cooldown_state;
        }
        let Some(child) = self.child.as_mut() else {
            return NodeState::Failure;
        };

        let state = child.evaluate(ctx);
        if state.is_terminal() && self.duration > 0.0 {
            self.cooling.set(true);
            let cooling = Rc::clone(&self.cooling);
            ctx.schedule(self.duration, move || cooling.set(false));
        }
        state
    }
}

/// Fails and aborts the child if it has not finished within `duration` seconds of starting.
/// No child: Failure.
pub struct TimeLimit {
    core: NodeCore,
    child: Option<Box<dyn Node>>,
    duration: f64,
    expired: Rc<Cell<bool>>,
    pending: Option<TimerToken>,
}

impl TimeLimit {
    pub fn new(child: Option<Box<dyn Node>>, duration: f64) -> Self {
        Self {
            core: NodeCore::new(),
            child,
            duration,
            expired: Rc::new(Cell::new(false)),
            pending: None,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for TimeLimit {
    decorator_plumbing!("time_limit");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(clone_child(&self.child), self.duration).with_core(self.core.clone()))
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) {
        self.expired.set(false);
        let expired = Rc::clone(&self.expired);
        self.pending = Some(ctx.schedule(self.duration, move || expired.set(true)));
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        let Some(child) = self.child.as_mut() else {
            return NodeState::Failure;
        };
        if self.expired.get() {
            child.abort(ctx);
            return NodeState::Failure;
        }
        child.evaluate(ctx)
    }

    fn on_stop(&mut self, ctx: &mut TickContext<'_>) {
        if let Some(token) = self.pending.take() {
            ctx.cancel(token);
        }
    }
}

/// Lets the child run with probability `chance`, drawn once per activation.
///
/// A failed draw returns Failure without ever starting the child. No child: the draw result.
pub struct Probability {
    core: NodeCore,
    child: Option<Box<dyn Node>>,
    chance: f64,
    passed: bool,
}

impl Probability {
    pub fn new(child: Option<Box<dyn Node>>, chance: f64) -> Self {
        Self {
            core: NodeCore::new(),
            child,
            chance,
            passed: false,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for Probability {
    decorator_plumbing!("probability");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(clone_child(&self.child), self.chance).with_core(self.core.clone()))
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) {
        self.passed = ctx.random_unit() < self.chance;
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        if !self.passed {
            return NodeState::Failure;
        }
        match self.child.as_mut() {
            Some(child) => child.evaluate(ctx),
            None => NodeState::Success,
        }
    }
}
