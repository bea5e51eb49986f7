use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use catalyst_core::{Bindings, Blackboard, Entity, EventMessage, TimerToken};
use catalyst_tools::{TraceEvent, TraceSink};

/// Identity of a node inside one bound tree instance (including subtrees it instantiates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Id carried by template nodes that were never bound.
    pub const UNBOUND: NodeId = NodeId(u32::MAX);

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out node ids for a tree instance; shared with the subtrees it spawns.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator(Rc<Cell<u32>>);

impl IdAllocator {
    /// Wraps back to zero instead of ever handing out `NodeId::UNBOUND`.
    pub fn next(&self) -> NodeId {
        let id = self.0.get();
        let following = id
            .checked_add(1)
            .filter(|n| *n != NodeId::UNBOUND.0)
            .unwrap_or(0);
        self.0.set(following);
        NodeId(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortKind {
    /// Interrupt whatever lower-priority branch is running so the requester gets evaluated.
    LowerPriority,
    /// Abort the requester itself (and its started descendants).
    SelfAbort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortRequest {
    pub requester: NodeId,
    pub kind: AbortKind,
}

/// Pending abort requests. Reactive nodes push from blackboard listeners; the tree drains.
#[derive(Debug, Clone, Default)]
pub struct AbortQueue(Rc<RefCell<VecDeque<AbortRequest>>>);

impl AbortQueue {
    pub fn push(&self, requester: NodeId, kind: AbortKind) {
        self.0.borrow_mut().push_back(AbortRequest { requester, kind });
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub(crate) fn drain(&self) -> Vec<AbortRequest> {
        self.0.borrow_mut().drain(..).collect()
    }
}

/// Everything a node can reach while it is being evaluated.
pub struct TickContext<'a> {
    pub blackboard: &'a mut Blackboard,
    bindings: &'a Bindings,
    aborts: &'a AbortQueue,
    ids: &'a IdAllocator,
    trace: Option<&'a mut (dyn TraceSink + 'static)>,
    tick: u64,
}

impl<'a> TickContext<'a> {
    pub fn new(
        blackboard: &'a mut Blackboard,
        bindings: &'a Bindings,
        aborts: &'a AbortQueue,
        ids: &'a IdAllocator,
        trace: Option<&'a mut (dyn TraceSink + 'static)>,
        tick: u64,
    ) -> Self {
        Self {
            blackboard,
            bindings,
            aborts,
            ids,
            trace,
            tick,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn bindings(&self) -> &Bindings {
        self.bindings
    }

    pub fn owner(&self) -> &Rc<dyn Entity> {
        &self.bindings.owner
    }

    pub fn now(&self) -> f64 {
        self.bindings.timer.borrow().now()
    }

    pub fn schedule(&self, delay_seconds: f64, callback: impl FnOnce() + 'static) -> TimerToken {
        self.bindings
            .timer
            .borrow_mut()
            .schedule(delay_seconds, Box::new(callback))
    }

    pub fn cancel(&self, token: TimerToken) -> bool {
        self.bindings.timer.borrow_mut().cancel(token)
    }

    /// Uniform draw in `[0, 1)` from the bound random source.
    pub fn random_unit(&self) -> f64 {
        self.bindings.rng.borrow_mut().next_unit()
    }

    pub fn random_range(&self, lo: usize, hi: usize) -> usize {
        self.bindings.rng.borrow_mut().range(lo, hi)
    }

    /// Returns `false` when no event sink was bound.
    pub fn raise(&self, message: &EventMessage) -> bool {
        match &self.bindings.events {
            Some(events) => {
                events.borrow_mut().raise(message);
                true
            }
            None => false,
        }
    }

    pub fn aborts(&self) -> &AbortQueue {
        self.aborts
    }

    pub fn request_abort(&self, requester: NodeId, kind: AbortKind) {
        self.aborts.push(requester, kind);
    }

    pub fn ids(&self) -> &IdAllocator {
        self.ids
    }

    pub fn is_tracing(&self) -> bool {
        self.trace.is_some()
    }

    pub fn emit(&mut self, event: TraceEvent) {
        if let Some(trace) = self.trace.as_deref_mut() {
            trace.emit(event);
        }
    }
}
