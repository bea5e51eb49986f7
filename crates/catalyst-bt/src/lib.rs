//! Behaviour-tree engine built on `catalyst-core`.
//!
//! Author a [`BehaviourTree`] template (in code or through [`NodeRegistry`]), then
//! [`BehaviourTree::instantiate`] it once per entity and call [`TreeInstance::evaluate`] every
//! tick.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod compare;
pub mod composite;
pub mod conditional;
pub mod config;
pub mod context;
pub mod decorator;
pub mod leaf;
pub mod node;
pub mod registry;
pub mod service;
pub mod subtree;
pub mod tree;

pub use compare::{CompareOp, Comparison};
pub use composite::{Parallel, ParallelPolicy, RandomSelector, Selector, Sequence};
pub use conditional::{AbortMode, BlackboardConditional};
pub use config::TreeConfig;
pub use context::{AbortKind, AbortQueue, AbortRequest, IdAllocator, NodeId, TickContext};
pub use decorator::{
    Cooldown, Failer, Inverter, Probability, Repeater, Succeeder, TimeLimit, UntilFail,
};
pub use leaf::{
    Action, BlackboardCondition, CapabilityAction, Condition, Log, LogLevel, PayloadSource,
    RaiseEvent, SetBlackboard, Wait,
};
pub use node::{Node, NodeCore, NodeState};
pub use registry::{BuildError, KeySpec, NodeRegistry, NodeSpec, ServiceSpec, TreeSpec};
pub use service::{ComputeService, CounterService, ServiceNode, ServiceTask, TimestampService};
pub use subtree::SubTree;
pub use tree::{BehaviourTree, NodeSnapshot, TreeInstance};
