use serde::{Deserialize, Serialize};

use crate::context::{NodeId, TickContext};
use crate::node::{clone_children, visit_children, visit_children_mut, Node, NodeCore, NodeState};

/// Lower-priority interrupt routing shared by the cursor-based composites.
///
/// `order[rank]` is the child index evaluated at position `rank`; `cursor` is the rank currently
/// running. If the requester sits in an earlier branch, the running branch is aborted and the
/// cursor rewound so the requester is evaluated next.
fn route_ordered(
    children: &mut [Box<dyn Node>],
    order: &[usize],
    cursor: &mut usize,
    requester: NodeId,
    ctx: &mut TickContext<'_>,
) -> bool {
    let Some(rank) = order
        .iter()
        .position(|&i| children.get(i).is_some_and(|c| c.contains(requester)))
    else {
        return false;
    };

    if rank == *cursor {
        return children[order[rank]].route_abort(requester, ctx);
    }
    if rank > *cursor {
        return false;
    }

    if let Some(&active) = order.get(*cursor) {
        children[active].abort(ctx);
    }
    tracing::debug!(
        requester = %requester,
        from = *cursor,
        to = rank,
        "rewinding composite for higher-priority branch"
    );
    *cursor = rank;
    true
}

/// AND: runs children in order until one fails. Resumes at the running child.
pub struct Sequence {
    core: NodeCore,
    children: Vec<Box<dyn Node>>,
    order: Vec<usize>,
    cursor: usize,
}

impl Sequence {
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self::with_core(NodeCore::new(), children)
    }

    pub fn with_core(core: NodeCore, children: Vec<Box<dyn Node>>) -> Self {
        let order = (0..children.len()).collect();
        Self {
            core,
            children,
            order,
            cursor: 0,
        }
    }

    pub fn current_child_index(&self) -> usize {
        self.cursor
    }
}

impl Node for Sequence {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "sequence"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::with_core(self.core.clone(), clone_children(&self.children)))
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.cursor = 0;
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        while self.cursor < self.children.len() {
            match self.children[self.cursor].evaluate(ctx) {
                NodeState::Running => return NodeState::Running,
                NodeState::Failure => return NodeState::Failure,
                NodeState::Success => self.cursor += 1,
            }
        }
        NodeState::Success
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn Node)) {
        visit_children(&self.children, f);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut dyn Node)) {
        visit_children_mut(&mut self.children, f);
    }

    fn route_abort(&mut self, requester: NodeId, ctx: &mut TickContext<'_>) -> bool {
        if !self.core.is_started() {
            return false;
        }
        route_ordered(&mut self.children, &self.order, &mut self.cursor, requester, ctx)
    }
}

/// OR: runs children in order until one succeeds. Resumes at the running child.
pub struct Selector {
    core: NodeCore,
    children: Vec<Box<dyn Node>>,
    order: Vec<usize>,
    cursor: usize,
}

impl Selector {
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self::with_core(NodeCore::new(), children)
    }

    pub fn with_core(core: NodeCore, children: Vec<Box<dyn Node>>) -> Self {
        let order = (0..children.len()).collect();
        Self {
            core,
            children,
            order,
            cursor: 0,
        }
    }

    pub fn current_child_index(&self) -> usize {
        self.cursor
    }
}

impl Node for Selector {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "selector"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::with_core(self.core.clone(), clone_children(&self.children)))
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.cursor = 0;
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        while self.cursor < self.children.len() {
            match self.children[self.cursor].evaluate(ctx) {
                NodeState::Running => return NodeState::Running,
                NodeState::Success => return NodeState::Success,
                NodeState::Failure => self.cursor += 1,
            }
        }
        NodeState::Failure
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn Node)) {
        visit_children(&self.children, f);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut dyn Node)) {
        visit_children_mut(&mut self.children, f);
    }

    fn route_abort(&mut self, requester: NodeId, ctx: &mut TickContext<'_>) -> bool {
        if !self.core.is_started() {
            return false;
        }
        route_ordered(&mut self.children, &self.order, &mut self.cursor, requester, ctx)
    }
}

/// Selector over a permutation of its children drawn once per activation (Fisher-Yates).
pub struct RandomSelector {
    core: NodeCore,
    children: Vec<Box<dyn Node>>,
    order: Vec<usize>,
    cursor: usize,
}

impl RandomSelector {
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self::with_core(NodeCore::new(), children)
    }

    pub fn with_core(core: NodeCore, children: Vec<Box<dyn Node>>) -> Self {
        let order = (0..children.len()).collect();
        Self {
            core,
            children,
            order,
            cursor: 0,
        }
    }

    /// Child indices in the order drawn for the current activation.
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

impl Node for RandomSelector {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "random_selector"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::with_core(self.core.clone(), clone_children(&self.children)))
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) {
        self.cursor = 0;
        self.order.clear();
        self.order.extend(0..self.children.len());
        for i in (1..self.order.len()).rev() {
            let j = ctx.random_range(0, i + 1);
            self.order.swap(i, j);
        }
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        while self.cursor < self.order.len() {
            let index = self.order[self.cursor];
            match self.children[index].evaluate(ctx) {
                NodeState::Running => return NodeState::Running,
                NodeState::Success => return NodeState::Success,
                NodeState::Failure => self.cursor += 1,
            }
        }
        NodeState::Failure
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn Node)) {
        visit_children(&self.children, f);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut dyn Node)) {
        visit_children_mut(&mut self.children, f);
    }

    fn route_abort(&mut self, requester: NodeId, ctx: &mut TickContext<'_>) -> bool {
        if !self.core.is_started() {
            return false;
        }
        route_ordered(&mut self.children, &self.order, &mut self.cursor, requester, ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelPolicy {
    RequireAll,
    RequireOne,
}

impl ParallelPolicy {
    fn satisfied(self, count: usize, total: usize) -> bool {
        match self {
            ParallelPolicy::RequireAll => count == total,
            ParallelPolicy::RequireOne => count >= 1,
        }
    }
}

/// Polls every child each tick and completes according to its two policies.
///
/// A child that finished on an earlier tick is evaluated again, which restarts it.
/// The failure policy is checked before the success policy. An empty parallel succeeds.
pub struct Parallel {
    core: NodeCore,
    children: Vec<Box<dyn Node>>,
    success_policy: ParallelPolicy,
    failure_policy: ParallelPolicy,
}

impl Parallel {
    pub fn new(
        children: Vec<Box<dyn Node>>,
        success_policy: ParallelPolicy,
        failure_policy: ParallelPolicy,
    ) -> Self {
        Self::with_core(NodeCore::new(), children, success_policy, failure_policy)
    }

    pub fn with_core(
        core: NodeCore,
        children: Vec<Box<dyn Node>>,
        success_policy: ParallelPolicy,
        failure_policy: ParallelPolicy,
    ) -> Self {
        Self {
            core,
            children,
            success_policy,
            failure_policy,
        }
    }

    pub fn success_policy(&self) -> ParallelPolicy {
        self.success_policy
    }

    pub fn failure_policy(&self) -> ParallelPolicy {
        self.failure_policy
    }

    fn abort_running(&mut self, ctx: &mut TickContext<'_>) {
        for child in self.children.iter_mut() {
            if child.is_started() {
                child.abort(ctx);
            }
        }
    }
}

impl Node for Parallel {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "parallel"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Self::with_core(
            self.core.clone(),
            clone_children(&self.children),
            self.success_policy,
            self.failure_policy,
        ))
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        let total = self.children.len();
        if total == 0 {
            return NodeState::Success;
        }

        // every child is polled every tick; finished children restart on their next poll
        let (mut succeeded, mut failed, mut running) = (0, 0, 0);
        for child in self.children.iter_mut() {
            match child.evaluate(ctx) {
                NodeState::Success => succeeded += 1,
                NodeState::Failure => failed += 1,
                NodeState::Running => running += 1,
            }
        }

        if self.failure_policy.satisfied(failed, total) {
            self.abort_running(ctx);
            return NodeState::Failure;
        }
        if self.success_policy.satisfied(succeeded, total) {
            self.abort_running(ctx);
            return NodeState::Success;
        }
        if running > 0 {
            return NodeState::Running;
        }
        NodeState::Success
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn Node)) {
        visit_children(&self.children, f);
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut dyn Node)) {
        visit_children_mut(&mut self.children, f);
    }
}
