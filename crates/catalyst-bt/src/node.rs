use std::borrow::Cow;

use catalyst_core::Bindings;
use catalyst_tools::{TraceEvent, TraceKind};

use serde::{Deserialize, Serialize};

use crate::context::{IdAllocator, NodeId, TickContext};
use crate::service::ServiceNode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Running,
    Success,
    Failure,
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NodeState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Running => "running",
            NodeState::Success => "success",
            NodeState::Failure => "failure",
        }
    }
}

/// State shared by every node: identity, lifecycle flags and attached services.
///
/// Cloning a core yields a fresh, unbound copy: ids, `started` and diagnostics are per-instance.
pub struct NodeCore {
    id: NodeId,
    parent: Option<NodeId>,
    name: Option<Cow<'static, str>>,
    started: bool,
    state: Option<NodeState>,
    diagnostic: Option<String>,
    services: Vec<ServiceNode>,
}

impl NodeCore {
    pub fn new() -> Self {
        Self {
            id: NodeId::UNBOUND,
            parent: None,
            name: None,
            started: false,
            state: None,
            diagnostic: None,
            services: Vec::new(),
        }
    }

    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        let mut core = Self::new();
        core.name = Some(name.into());
        core
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<Cow<'static, str>>) {
        self.name = Some(name.into());
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Last state returned by `on_update`, `None` before the first evaluation.
    pub fn state(&self) -> Option<NodeState> {
        self.state
    }

    /// Why the node last failed on a missing precondition, for tooling.
    pub fn diagnostic(&self) -> Option<&str> {
        self.diagnostic.as_deref()
    }

    pub fn set_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostic = Some(message.into());
    }

    pub fn services(&self) -> &[ServiceNode] {
        &self.services
    }

    pub fn add_service(&mut self, service: ServiceNode) {
        self.services.push(service);
    }
}

impl Default for NodeCore {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for NodeCore {
    fn clone(&self) -> Self {
        Self {
            id: NodeId::UNBOUND,
            parent: None,
            name: self.name.clone(),
            started: false,
            state: None,
            diagnostic: None,
            services: self.services.clone(),
        }
    }
}

impl std::fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("started", &self.started)
            .field("state", &self.state)
            .field("services", &self.services.len())
            .finish()
    }
}

/// A behaviour-tree node.
///
/// Implementors provide the hooks (`on_start`, `on_update`, `on_stop`, ...) and structural
/// visitors; the lifecycle itself (`evaluate`, `abort`) is provided and should not be overridden.
pub trait Node: 'static {
    fn core(&self) -> &NodeCore;

    fn core_mut(&mut self) -> &mut NodeCore;

    /// Registry tag, also used as the display label for unnamed nodes.
    fn kind(&self) -> &'static str;

    /// Deep copy with fresh per-instance state.
    fn clone_node(&self) -> Box<dyn Node>;

    fn on_bind(&mut self, _bindings: &Bindings) {}

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {}

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState;

    /// Runs on every transition out of the started state, completion and abort alike.
    fn on_stop(&mut self, _ctx: &mut TickContext<'_>) {}

    /// Runs before `on_stop` when the node is aborted.
    fn on_abort(&mut self, _ctx: &mut TickContext<'_>) {}

    /// The node's instance is being discarded; drop any registrations it made.
    fn on_release(&mut self, _ctx: &mut TickContext<'_>) {}

    fn for_each_child(&self, _f: &mut dyn FnMut(&dyn Node)) {}

    fn for_each_child_mut(&mut self, _f: &mut dyn FnMut(&mut dyn Node)) {}

    /// Route a lower-priority interrupt requested by `requester`.
    ///
    /// Returns `true` once some node on the path aborted its running branch so the requester
    /// becomes reachable. Composites override this; the default just follows the started path.
    fn route_abort(&mut self, requester: NodeId, ctx: &mut TickContext<'_>) -> bool {
        if !self.core().is_started() {
            return false;
        }
        let mut handled = false;
        self.for_each_child_mut(&mut |child| {
            if !handled && child.contains(requester) {
                handled = child.route_abort(requester, ctx);
            }
        });
        handled
    }

    fn id(&self) -> NodeId {
        self.core().id()
    }

    fn is_started(&self) -> bool {
        self.core().is_started()
    }

    fn label(&self) -> Cow<'static, str> {
        match &self.core().name {
            Some(name) => name.clone(),
            None => Cow::Borrowed(self.kind()),
        }
    }

    fn evaluate(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        if !self.core().started {
            let core = self.core_mut();
            core.started = true;
            core.diagnostic = None;
            for service in core.services.iter_mut() {
                service.activate();
            }
            if ctx.is_tracing() {
                ctx.emit(TraceEvent::new(
                    ctx.tick(),
                    TraceKind::Start,
                    self.id().index(),
                    self.label(),
                ));
            }
            self.on_start(ctx);
        }

        let id = self.id();
        for service in self.core_mut().services.iter_mut() {
            service.tick_service(id, ctx);
        }

        let state = self.on_update(ctx);
        self.core_mut().state = Some(state);
        if state.is_terminal() {
            self.on_stop(ctx);
            self.core_mut().started = false;
            if ctx.is_tracing() {
                ctx.emit(
                    TraceEvent::new(ctx.tick(), TraceKind::Stop, id.index(), self.label())
                        .with_status(state.as_str()),
                );
            }
        }
        state
    }

    /// Force-stop this node and every started descendant. No-op when not started.
    fn abort(&mut self, ctx: &mut TickContext<'_>) {
        if !self.core().started {
            return;
        }
        self.for_each_child_mut(&mut |child| child.abort(ctx));
        self.on_abort(ctx);
        self.on_stop(ctx);
        self.core_mut().started = false;
        tracing::trace!(node = %self.id(), kind = self.kind(), "node aborted");
        if ctx.is_tracing() {
            ctx.emit(TraceEvent::new(
                ctx.tick(),
                TraceKind::Abort,
                self.id().index(),
                self.label(),
            ));
        }
    }

    fn contains(&self, id: NodeId) -> bool {
        if self.id() == id {
            return true;
        }
        let mut found = false;
        self.for_each_child(&mut |child| {
            if !found && child.contains(id) {
                found = true;
            }
        });
        found
    }

    /// Abort the node with id `target` wherever it sits below this one.
    /// Returns `true` if the target was started.
    fn abort_node(&mut self, target: NodeId, ctx: &mut TickContext<'_>) -> bool {
        if self.id() == target {
            let was_started = self.is_started();
            self.abort(ctx);
            return was_started;
        }
        let mut aborted = false;
        let mut found = false;
        self.for_each_child_mut(&mut |child| {
            if !found && child.contains(target) {
                found = true;
                aborted = child.abort_node(target, ctx);
            }
        });
        aborted
    }
}

impl Clone for Box<dyn Node> {
    fn clone(&self) -> Self {
        self.clone_node()
    }
}

/// Assign ids and parent links top-down and hand every node the bindings.
pub(crate) fn bind_node(
    node: &mut dyn Node,
    parent: Option<NodeId>,
    ids: &IdAllocator,
    bindings: &Bindings,
) {
    let id = ids.next();
    {
        let core = node.core_mut();
        core.id = id;
        core.parent = parent;
    }
    node.on_bind(bindings);
    node.for_each_child_mut(&mut |child| bind_node(child, Some(id), ids, bindings));
}

pub(crate) fn release_node(node: &mut dyn Node, ctx: &mut TickContext<'_>) {
    node.on_release(ctx);
    node.for_each_child_mut(&mut |child| release_node(child, ctx));
}

pub(crate) fn clone_child(child: &Option<Box<dyn Node>>) -> Option<Box<dyn Node>> {
    child.as_ref().map(|c| c.clone_node())
}

pub(crate) fn clone_children(children: &[Box<dyn Node>]) -> Vec<Box<dyn Node>> {
    children.iter().map(|c| c.clone_node()).collect()
}

pub(crate) fn visit_child(child: &Option<Box<dyn Node>>, f: &mut dyn FnMut(&dyn Node)) {
    if let Some(child) = child {
        f(&**child);
    }
}

pub(crate) fn visit_child_mut(
    child: &mut Option<Box<dyn Node>>,
    f: &mut dyn FnMut(&mut dyn Node),
) {
    if let Some(child) = child {
        f(&mut **child);
    }
}

pub(crate) fn visit_children(children: &[Box<dyn Node>], f: &mut dyn FnMut(&dyn Node)) {
    for child in children {
        f(&**child);
    }
}

pub(crate) fn visit_children_mut(
    children: &mut [Box<dyn Node>],
    f: &mut dyn FnMut(&mut dyn Node),
) {
    for child in children {
        f(&mut **child);
    }
}
