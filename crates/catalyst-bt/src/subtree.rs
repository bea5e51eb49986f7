use std::rc::Rc;

use crate::context::TickContext;
use crate::node::{bind_node, release_node, Node, NodeCore, NodeState};
use crate::tree::BehaviourTree;

/// Runs a separate tree template as if it were part of this tree.
///
/// The template's root is cloned and bound on every activation. The clone shares the host
/// tree's blackboard and owner; keys the template declares but the host lacks are seeded from
/// the template's initial values. No template: Failure.
pub struct SubTree {
    core: NodeCore,
    template: Option<Rc<BehaviourTree>>,
    inner: Option<Box<dyn Node>>,
}

impl SubTree {
    pub fn new(template: Rc<BehaviourTree>) -> Self {
        Self {
            core: NodeCore::new(),
            template: Some(template),
            inner: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            core: NodeCore::new(),
            template: None,
            inner: None,
        }
    }

    pub fn with_core(mut self, core: NodeCore) -> Self {
        self.core = core;
        self
    }

    pub fn template(&self) -> Option<&Rc<BehaviourTree>> {
        self.template.as_ref()
    }

    /// Root of the running instance, if the subtree is active.
    pub fn instance_root(&self) -> Option<&dyn Node> {
        self.inner.as_deref()
    }
}

impl Node for SubTree {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "subtree"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        let copy = Self {
            core: self.core.clone(),
            template: self.template.clone(),
            inner: None,
        };
        Box::new(copy)
    }

    fn on_start(&mut self, ctx: &mut TickContext<'_>) {
        let Some(template) = self.template.as_ref() else {
            tracing::warn!(node = %self.id(), "subtree has no template");
            return;
        };

        ctx.blackboard.seed_missing_from(template.blackboard());
        let mut root = template.root().clone_node();
        bind_node(&mut *root, Some(self.id()), ctx.ids(), ctx.bindings());
        tracing::debug!(node = %self.id(), root = %root.id(), "subtree instantiated");
        self.inner = Some(root);
    }

    fn on_update(&mut self, ctx: &mut TickContext<'_>) -> NodeState {
        match self.inner.as_mut() {
            Some(root) => root.evaluate(ctx),
            None => NodeState::Failure,
        }
    }

    fn on_stop(&mut self, ctx: &mut TickContext<'_>) {
        if let Some(mut root) = self.inner.take() {
            root.abort(ctx);
            release_node(&mut *root, ctx);
        }
    }

    fn for_each_child(&self, f: &mut dyn FnMut(&dyn Node)) {
        if let Some(root) = self.inner.as_deref() {
            f(root);
        }
    }

    fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut dyn Node)) {
        if let Some(root) = self.inner.as_deref_mut() {
            f(root);
        }
    }
}
