//! Engine-agnostic primitives for the Catalyst behaviour-tree runtime.
//!
//! Nothing in here knows about nodes or trees: these are the collaborators a tree is bound to
//! (owner entity, timer facility, random source, event sink) plus the shared [`Blackboard`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod bindings;
pub mod blackboard;
pub mod entity;
pub mod error;
pub mod event;
pub mod rng;
pub mod timer;
pub mod value;

pub use bindings::Bindings;
pub use blackboard::{
    BbKey, Blackboard, BlackboardChange, BlackboardValue, ListenerId, ValueType,
};
pub use entity::{Agent, Entity};
pub use error::BlackboardError;
pub use event::{EventLog, EventMessage, EventPayload, EventSink};
pub use rng::{derive_seed, RandomSource, SplitMix64};
pub use timer::{ManualTimer, TimerFacility, TimerToken};
pub use value::{BbValue, ValueKind};
