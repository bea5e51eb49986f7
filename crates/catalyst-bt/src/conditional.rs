use std::cell::Cell;
use std::rc::Rc;

use catalyst_core::ListenerId;
use serde::{Deserialize, Serialize};

use crate::compare::Comparison;
use crate::context::{AbortKind, TickContext};
use crate::node::{clone_child, visit_child, visit_child_mut, Node, NodeCore, NodeState};

/// Which interrupts a [`BlackboardConditional`] requests when its condition flips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortMode {
    #[default]
    None,
    /// Abort this branch when the condition turns false while it runs.
    #[serde(rename = "self")]
    SelfBranch,
    /// Interrupt a running lower-priority branch when the condition turns true.
    LowerPriority,
    Both,
}

impl AbortMode {
    pub fn aborts_self(self) -> bool {
        matches!(self, AbortMode::SelfBranch | AbortMode::Both)
    }

    pub fn aborts_lower_priority(self) -> bool {
        matches!(self, AbortMode::LowerPriority | AbortMode::Both)
    }
}

/// Gates its child on a blackboard comparison, re-checked every tick.
///
/// With an abort mode other than `None` it also watches the key: the listener is registered
/// the first time the node starts and stays until the instance is released. Flips seen by the
/// listener are turned into abort requests on the tree's queue, never handled inline.
pub struct BlackboardConditional {
    core: NodeCore,
    child: Option<Box<dyn Node>>,
    comparison: Comparison,
    abort_mode: AbortMode,
    listener: Option<ListenerId>,
    active: Rc<Cell<bool>>,
}

impl BlackboardConditional {
    pub fn new(comparison: Comparison, abort_mode: AbortMode, child: Option<Box<dyn Node>>) -> Self {
        Self {
            core: NodeCore::new(),
            child,
            comparison,
            abort_mode,
            listener: None,
            active: Rc::new(Cell::new(false)),
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    pub fn abort_mode(&self) -> AbortMode {
        self.abort_mode
    }

    pub fn is_observing(&self) -> bool {
        self.listener.is_some()
    }

    fn observe(&mut self, ctx: &mut TickContext<'_>) {
        let requester = self.id();
        let mode = self.abort_mode;
        let comparison = self.comparison.clone();
        let active = Rc::clone(&self.active);
        let aborts = ctx.aborts().clone();

        let id = ctx.blackboard.observe(&self.comparison.key, move |change| {
            let before = comparison.matches(change.old);
            let after = comparison.matches(change.new);
            if before == after {
                return;
            }
            if after && !active.get() && mode.aborts_lower_priority() {
                aborts.push(requester, AbortKind::LowerPriority);
            } else if !after && active.get() && mode.aborts_self() {
                aborts.push(requester, AbortKind::SelfAbort);
            }
        });
        self.listener = Some(id);
    }
}

impl Node for BlackboardConditional {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "blackboard_conditional"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(
            Self::new(
                self.comparison.clone(),
                self.abort_mode,
                clone_child(&self.child),
            )
            .with_core(self.core.clone()),
        )
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) {
        if self.abort_mode != AbortMode::None && self.listener.is_none() {
            self.observe(ctx);
        }
        self.active.set(true);
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        if !self.comparison.evaluate(ctx.blackboard) {
            if let Some(child) = self.child.as_mut() {
                child.abort(ctx);
            }
            return NodeState::Failure;
        }
        match self.child.as_mut() {
            Some(child) => child.evaluate(ctx),
            None => NodeState::Success,
        }
    }

    fn on_stop(&mut self, _ctx: &mut TickContext<'_>) {
        self.active.set(false);
    }

    fn on_release(&mut self, ctx: &mut TickContext<'_>) {
        if let Some(id) = self.listener.take() {
            ctx.blackboard.unobserve(&self.comparison.key, id);
        }
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn Node)) {
        visit_child(&self.child, f);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut dyn Node)) {
        visit_child_mut(&mut self.child, f);
    }
}
