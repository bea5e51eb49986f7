use std::fmt;
use std::rc::Rc;

use catalyst_core::{Bindings, Blackboard, Entity};
use catalyst_tools::{TraceEvent, TraceKind, TraceSink};

use crate::config::TreeConfig;
use crate::context::{AbortKind, AbortQueue, IdAllocator, NodeId, TickContext};
use crate::node::{bind_node, Node, NodeState};

/// An authored tree: root node, initial blackboard and config.
///
/// Templates are never evaluated. [`BehaviourTree::instantiate`] (or [`BehaviourTree::bind`])
/// produces a [`TreeInstance`] with its own copy of every node and value.
pub struct BehaviourTree {
    root: Box<dyn Node>,
    blackboard: Blackboard,
    config: TreeConfig,
}

impl BehaviourTree {
    pub fn new(root: impl Node) -> Self {
        Self::from_boxed(Box::new(root))
    }

    pub fn from_boxed(root: Box<dyn Node>) -> Self {
        Self {
            root,
            blackboard: Blackboard::new(),
            config: TreeConfig::default(),
        }
    }

    pub fn with_blackboard(mut self, blackboard: Blackboard) -> Self {
        self.blackboard = blackboard;
        self
    }

    pub fn with_config(mut self, config: TreeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> &dyn Node {
        &*self.root
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Clone the template and bind the copy.
    pub fn instantiate(&self, bindings: Bindings) -> TreeInstance {
        self.clone().bind(bindings)
    }

    /// Turn this template into a runtime instance, assigning node ids and parent links and
    /// handing every node the bindings.
    pub fn bind(self, bindings: Bindings) -> TreeInstance {
        let Self {
            mut root,
            blackboard,
            config,
        } = self;
        let ids = IdAllocator::default();
        bind_node(&mut *root, None, &ids, &bindings);
        tracing::debug!(
            owner = bindings.owner.stable_id(),
            root = root.kind(),
            "tree bound"
        );
        TreeInstance {
            root,
            blackboard,
            bindings,
            aborts: AbortQueue::default(),
            ids,
            config,
            state: None,
            tick: 0,
            trace: None,
        }
    }
}

impl Clone for BehaviourTree {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone_node(),
            blackboard: self.blackboard.clone(),
            config: self.config.clone(),
        }
    }
}

impl fmt::Debug for BehaviourTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviourTree")
            .field("root", &self.root.kind())
            .field("blackboard", &self.blackboard)
            .field("config", &self.config)
            .finish()
    }
}

/// Read-only view of one node, for debuggers and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub depth: usize,
    pub kind: &'static str,
    pub label: String,
    pub started: bool,
    pub state: Option<NodeState>,
    pub diagnostic: Option<String>,
}

/// A bound, runnable tree owned by one entity.
pub struct TreeInstance {
    root: Box<dyn Node>,
    blackboard: Blackboard,
    bindings: Bindings,
    aborts: AbortQueue,
    ids: IdAllocator,
    config: TreeConfig,
    state: Option<NodeState>,
    tick: u64,
    trace: Option<Box<dyn TraceSink>>,
}

impl TreeInstance {
    /// Run one tick.
    ///
    /// Pending abort requests are serviced first. If the pass itself queues new requests they
    /// are serviced right away and, when they aborted something, the root is evaluated again
    /// so the interrupting branch runs within this same call.
    pub fn evaluate(&mut self) -> NodeState {
        if !self.config.restart_on_completion {
            if let Some(state) = self.state.filter(|s| s.is_terminal()) {
                return state;
            }
        }

        self.tick += 1;
        let max_passes = self.config.max_interrupt_passes;
        let state = self.with_context(|root, ctx| {
            service_aborts(root, ctx);
            let mut state = root.evaluate(ctx);
            let mut passes = 0;
            while !ctx.aborts().is_empty() {
                if passes >= max_passes {
                    tracing::warn!(
                        pending = ctx.aborts().len(),
                        passes,
                        "interrupt pass limit reached, deferring to next tick"
                    );
                    break;
                }
                passes += 1;
                if service_aborts(root, ctx) {
                    state = root.evaluate(ctx);
                }
            }
            state
        });

        self.state = Some(state);
        state
    }

    /// Abort every running node so the next `evaluate` starts from the top.
    pub fn reset(&mut self) {
        self.with_context(|root, ctx| root.abort(ctx));
        self.aborts.clear();
        self.state = None;
        tracing::debug!(owner = self.bindings.owner.stable_id(), "tree reset");
    }

    /// Queue an interrupt on behalf of `requester`; serviced at the start of the next
    /// `evaluate`.
    pub fn request_abort(&self, requester: NodeId, kind: AbortKind) {
        self.aborts.push(requester, kind);
    }

    /// Result of the last `evaluate`, `None` before the first tick or after `reset`.
    pub fn state(&self) -> Option<NodeState> {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn root(&self) -> &dyn Node {
        &*self.root
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    /// Writes made here notify listeners immediately; any interrupts they request are
    /// serviced on the next `evaluate`.
    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn owner(&self) -> &Rc<dyn Entity> {
        &self.bindings.owner
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn pending_aborts(&self) -> usize {
        self.aborts.len()
    }

    pub fn set_trace_sink(&mut self, sink: impl TraceSink + 'static) {
        self.trace = Some(Box::new(sink));
    }

    pub fn clear_trace_sink(&mut self) {
        self.trace = None;
    }

    /// Id of the first node (pre-order) labelled `name`.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.describe()
            .into_iter()
            .find(|n| n.label == name)
            .map(|n| n.id)
    }

    pub fn find(&self, name: &str) -> Option<NodeSnapshot> {
        self.describe().into_iter().find(|n| n.label == name)
    }

    /// Pre-order snapshot of every node, including the instances of active subtrees.
    pub fn describe(&self) -> Vec<NodeSnapshot> {
        let mut out = Vec::new();
        snapshot(&*self.root, 0, &mut out);
        out
    }

    fn with_context<R>(&mut self, f: impl FnOnce(&mut dyn Node, &mut TickContext<'_>) -> R) -> R {
        let Self {
            root,
            blackboard,
            bindings,
            aborts,
            ids,
            trace,
            tick,
            ..
        } = self;
        let mut ctx = TickContext::new(blackboard, bindings, aborts, ids, trace.as_deref_mut(), *tick);
        f(&mut **root, &mut ctx)
    }
}

impl fmt::Debug for TreeInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeInstance")
            .field("owner", &self.bindings.owner.stable_id())
            .field("root", &self.root.kind())
            .field("state", &self.state)
            .field("tick", &self.tick)
            .field("pending_aborts", &self.aborts.len())
            .finish()
    }
}

/// Returns whether any request actually aborted something.
fn service_aborts(root: &mut dyn Node, ctx: &mut TickContext<'_>) -> bool {
    let requests = ctx.aborts().drain();
    let mut handled = false;
    for request in requests {
        let done = match request.kind {
            AbortKind::LowerPriority => root.route_abort(request.requester, ctx),
            AbortKind::SelfAbort => root.abort_node(request.requester, ctx),
        };
        tracing::debug!(
            requester = %request.requester,
            kind = ?request.kind,
            handled = done,
            "abort request"
        );
        if done && ctx.is_tracing() {
            let label = match request.kind {
                AbortKind::LowerPriority => "lower_priority",
                AbortKind::SelfAbort => "self",
            };
            ctx.emit(TraceEvent::new(
                ctx.tick(),
                TraceKind::Interrupt,
                request.requester.index(),
                label,
            ));
        }
        handled |= done;
    }
    handled
}

fn snapshot(node: &dyn Node, depth: usize, out: &mut Vec<NodeSnapshot>) {
    let core = node.core();
    out.push(NodeSnapshot {
        id: core.id(),
        parent: core.parent(),
        depth,
        kind: node.kind(),
        label: node.label().into_owned(),
        started: core.is_started(),
        state: core.state(),
        diagnostic: core.diagnostic().map(str::to_owned),
    });
    node.for_each_child(&mut |child| snapshot(child, depth + 1, out));
}
