#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TraceKind {
    Start,
    /// Normal completion; `status` carries the terminal state.
    Stop,
    Abort,
    ServiceTick,
    /// The tree handed control to a higher-priority branch mid-tick.
    Interrupt,
}

/// A small trace event: plain data, recorded during evaluation and rendered later by tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceEvent {
    pub tick: u64,
    pub kind: TraceKind,
    pub node: u32,
    pub label: Cow<'static, str>,
    pub status: Option<Cow<'static, str>>,
}

impl TraceEvent {
    pub fn new(tick: u64, kind: TraceKind, node: u32, label: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tick,
            kind,
            node,
            label: label.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<Cow<'static, str>>) -> Self {
        self.status = Some(status.into());
        self
    }
}

pub trait TraceSink {
    fn emit(&mut self, event: TraceEvent);
}

#[derive(Debug, Default)]
pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn emit(&mut self, _event: TraceEvent) {}
}

#[derive(Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TraceLog {
    pub events: Vec<TraceEvent>,
}

impl TraceLog {
    pub fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// `kind:label` strings, handy for asserting on ordering in tests.
    pub fn summary(&self) -> Vec<String> {
        self.events
            .iter()
            .map(|e| {
                let kind = match e.kind {
                    TraceKind::Start => "start",
                    TraceKind::Stop => "stop",
                    TraceKind::Abort => "abort",
                    TraceKind::ServiceTick => "service",
                    TraceKind::Interrupt => "interrupt",
                };
                format!("{kind}:{}", e.label)
            })
            .collect()
    }
}

impl TraceSink for TraceLog {
    fn emit(&mut self, event: TraceEvent) {
        self.push(event);
    }
}

/// A [`TraceLog`] the caller can keep reading while a tree owns the sink.
#[derive(Debug, Default, Clone)]
pub struct SharedTraceLog(pub Rc<RefCell<TraceLog>>);

impl SharedTraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> Vec<String> {
        self.0.borrow().summary()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.0.borrow().events.clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

impl TraceSink for SharedTraceLog {
    fn emit(&mut self, event: TraceEvent) {
        self.0.borrow_mut().push(event);
    }
}
