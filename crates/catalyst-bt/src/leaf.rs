//! Leaf nodes: closures, blackboard checks and writes, waits, logging, events, and
//! capability-gated actions on the owner.

use std::any::{type_name, Any};
use std::cell::Cell;
use std::marker::PhantomData;
use std::rc::Rc;

use catalyst_core::{BbValue, EventMessage, EventPayload, TimerToken, ValueKind};
use serde::{Deserialize, Serialize};

use crate::compare::Comparison;
use crate::context::TickContext;
use crate::node::{Node, NodeCore, NodeState};

macro_rules! leaf_plumbing {
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
    };
}

/// Leaf driven by a closure. The closure is cloned along with the tree, so any state it
/// captures by value is per instance.
pub struct Action<F> {
    core: NodeCore,
    run: F,
}

impl<F> Action<F>
where
    F: FnMut(&mut TickContext<'_>) -> NodeState + Clone + 'static,
{
    pub fn new(run: F) -> Self {
        Self {
            core: NodeCore::new(),
            run,
        }
    }

    pub fn named(name: &'static str, run: F) -> Self {
        Self {
            core: NodeCore::named(name),
            run,
        }
    }
}

impl<F> Node for Action<F>
where
    F: FnMut(&mut TickContext<'_>) -> NodeState + Clone + 'static,
{
    leaf_plumbing!("action");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self {
            core: self.core.clone(),
            run: self.run.clone(),
        })
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        (self.run)(ctx)
    }
}

/// Leaf that succeeds when the predicate holds and fails otherwise. Never runs.
pub struct Condition<F> {
    core: NodeCore,
    predicate: F,
}

impl<F> Condition<F>
where
    F: Fn(&TickContext<'_>) -> bool + Clone + 'static,
{
    pub fn new(predicate: F) -> Self {
        Self {
            core: NodeCore::new(),
            predicate,
        }
    }

    pub fn named(name: &'static str, predicate: F) -> Self {
        Self {
            core: NodeCore::named(name),
            predicate,
        }
    }
}

impl<F> Node for Condition<F>
where
    F: Fn(&TickContext<'_>) -> bool + Clone + 'static,
{
    leaf_plumbing!("condition");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self {
            core: self.core.clone(),
            predicate: self.predicate.clone(),
        })
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        if (self.predicate)(ctx) {
            NodeState::Success
        } else {
            NodeState::Failure
        }
    }
}

/// Leaf form of a blackboard comparison.
pub struct BlackboardCondition {
    core: NodeCore,
    comparison: Comparison,
}

impl BlackboardCondition {
    pub fn new(comparison: Comparison) -> Self {
        Self {
            core: NodeCore::new(),
            comparison,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for BlackboardCondition {
    leaf_plumbing!("blackboard_condition");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(self.comparison.clone()).with_core(self.core.clone()))
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        if self.comparison.evaluate(ctx.blackboard) {
            NodeState::Success
        } else {
            NodeState::Failure
        }
    }
}

/// Runs for `duration` seconds of timer time, then succeeds.
pub struct Wait {
    core: NodeCore,
    duration: f64,
    elapsed: Rc<Cell<bool>>,
    pending: Option<TimerToken>,
}

impl Wait {
    pub fn new(duration: f64) -> Self {
        Self {
            core: NodeCore::new(),
            duration,
            elapsed: Rc::new(Cell::new(false)),
            pending: None,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}

impl Node for Wait {
    leaf_plumbing!("wait");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(self.duration).with_core(self.core.clone()))
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) {
        if self.duration <= 0.0 {
            self.elapsed.set(true);
            return;
        }
        self.elapsed.set(false);
        let elapsed = Rc::clone(&self.elapsed);
        self.pending = Some(ctx.schedule(self.duration, move || elapsed.set(true)));
    }

    fn on_update(&mut self, _ctx: &mut TickContext<'_>) -> NodeState {
        if self.elapsed.get() {
            NodeState::Success
        } else {
            NodeState::Running
        }
    }

    fn on_stop(&mut self, ctx: &mut TickContext<'_>) {
        if let Some(token) = self.pending.take() {
            ctx.cancel(token);
        }
    }
}

/// Writes a fixed scalar into the blackboard and succeeds.
pub struct SetBlackboard {
    core: NodeCore,
    key: String,
    value: BbValue,
}

impl SetBlackboard {
    pub fn new(key: impl Into<String>, value: impl Into<BbValue>) -> Self {
        Self {
            core: NodeCore::new(),
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for SetBlackboard {
    leaf_plumbing!("set_blackboard");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(self.key.clone(), self.value.clone()).with_core(self.core.clone()))
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        self.value.write(ctx.blackboard, &self.key);
        NodeState::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Emits `message` as a `tracing` event and succeeds.
pub struct Log {
    core: NodeCore,
    message: String,
    level: LogLevel,
}

impl Log {
    pub fn new(message: impl Into<String>, level: LogLevel) -> Self {
        Self {
            core: NodeCore::new(),
            message: message.into(),
            level,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for Log {
    leaf_plumbing!("log");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(self.message.clone(), self.level).with_core(self.core.clone()))
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        let owner = ctx.owner().stable_id();
        let node = self.id().index();
        let message = self.message.as_str();
        match self.level {
            LogLevel::Trace => tracing::trace!(owner, node, "{message}"),
            LogLevel::Debug => tracing::debug!(owner, node, "{message}"),
            LogLevel::Info => tracing::info!(owner, node, "{message}"),
            LogLevel::Warn => tracing::warn!(owner, node, "{message}"),
            LogLevel::Error => tracing::error!(owner, node, "{message}"),
        }
        NodeState::Success
    }
}

/// Where a [`RaiseEvent`] gets its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum PayloadSource {
    /// A payload fixed when the tree was authored.
    Fixed { payload: EventPayload },
    /// The current value of a blackboard key, read as `kind`.
    Blackboard { key: String, kind: ValueKind },
}

impl PayloadSource {
    pub fn signal() -> Self {
        PayloadSource::Fixed {
            payload: EventPayload::Signal,
        }
    }
}

/// Sends an [`EventMessage`] to the bound event sink.
///
/// Fails with a diagnostic when no sink is bound or the blackboard payload is unavailable.
pub struct RaiseEvent {
    core: NodeCore,
    channel: String,
    source: PayloadSource,
}

impl RaiseEvent {
    pub fn new(channel: impl Into<String>, source: PayloadSource) -> Self {
        Self {
            core: NodeCore::new(),
            channel: channel.into(),
            source,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }
}

impl Node for RaiseEvent {
    leaf_plumbing!("raise_event");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::new(self.channel.clone(), self.source.clone()).with_core(self.core.clone()))
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        let payload = match &self.source {
            PayloadSource::Fixed { payload } => payload.clone(),
            PayloadSource::Blackboard { key, kind } => {
                match BbValue::read(ctx.blackboard, key, *kind) {
                    Some(value) => EventPayload::from(value),
                    None => {
                        self.core
                            .set_diagnostic(format!("blackboard key `{key}` is not a {kind:?}"));
                        return NodeState::Failure;
                    }
                }
            }
        };

        let message = EventMessage {
            channel: self.channel.clone(),
            payload,
            sender: ctx.owner().stable_id(),
        };
        if ctx.raise(&message) {
            NodeState::Success
        } else {
            tracing::debug!(channel = %self.channel, "no event sink bound");
            self.core.set_diagnostic("no event sink bound");
            NodeState::Failure
        }
    }
}

/// Runs `F` against capability `C` of the owner.
///
/// If the owner does not expose `C` the node fails and records a diagnostic naming the
/// missing type.
pub struct CapabilityAction<C, F> {
    core: NodeCore,
    run: F,
    _capability: PhantomData<fn() -> C>,
}

impl<C, F> CapabilityAction<C, F>
where
    C: Any,
    F: FnMut(&C, &mut TickContext<'_>) -> NodeState + Clone + 'static,
{
    pub fn new(run: F) -> Self {
        Self {
            core: NodeCore::new(),
            run,
            _capability: PhantomData,
        }
    }

    pub fn named(name: &'static str, run: F) -> Self {
        Self {
            core: NodeCore::named(name),
            run,
            _capability: PhantomData,
        }
    }
}

impl<C, F> Node for CapabilityAction<C, F>
where
    C: Any,
    F: FnMut(&C, &mut TickContext<'_>) -> NodeState + Clone + 'static,
{
    leaf_plumbing!("capability_action");

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self {
            core: self.core.clone(),
            run: self.run.clone(),
            _capability: PhantomData,
        })
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        let owner = Rc::clone(ctx.owner());
        let Some(capability) = owner.get::<C>() else {
            let message = format!(
                "owner {} has no `{}` capability",
                owner.stable_id(),
                type_name::<C>()
            );
            tracing::debug!(node = %self.id(), "{message}");
            self.core.set_diagnostic(message);
            return NodeState::Failure;
        };
        (self.run)(capability, ctx)
    }
}
