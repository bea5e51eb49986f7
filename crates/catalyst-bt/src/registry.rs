//! Building trees from data.
//!
//! A [`TreeSpec`] document names every node by a kind tag. [`NodeRegistry`] maps those tags to
//! factory functions; the built-ins are registered explicitly by
//! [`NodeRegistry::with_builtins`], and hosts add their own kinds with
//! [`NodeRegistry::register`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use catalyst_core::{BbValue, Blackboard, ValueKind};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compare::{CompareOp, Comparison};
use crate::composite::{Parallel, ParallelPolicy, RandomSelector, Selector, Sequence};
use crate::conditional::{AbortMode, BlackboardConditional};
use crate::config::TreeConfig;
use crate::decorator::{
    Cooldown, Failer, Inverter, Probability, Repeater, Succeeder, TimeLimit, UntilFail,
};
use crate::leaf::{BlackboardCondition, Log, LogLevel, PayloadSource, RaiseEvent, SetBlackboard, Wait};
use crate::node::{Node, NodeState};
use crate::service::{CounterService, ServiceNode, ServiceTask, TimestampService};
use crate::subtree::SubTree;
use crate::tree::BehaviourTree;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("unknown node kind `{kind}`")]
    UnknownKind { kind: String },

    #[error("unknown service kind `{kind}`")]
    UnknownService { kind: String },

    #[error("invalid params for `{kind}`: {source}")]
    InvalidParams {
        kind: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("`{kind}` takes {expected} children, got {found}")]
    ChildCount {
        kind: String,
        expected: &'static str,
        found: usize,
    },

    #[error("no subtree registered as `{name}`")]
    UnknownSubtree { name: String },

    #[error("default for blackboard key `{key}` is {found:?}, declared {expected:?}")]
    DefaultKind {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("malformed tree document: {0}")]
    Json(#[from] serde_json::Error),
}

/// One node in a tree document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<ServiceSpec>,
}

impl NodeSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            params: serde_json::Value::Null,
            children: Vec::new(),
            services: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_service(mut self, service: ServiceSpec) -> Self {
        self.services.push(service);
        self
    }
}

/// A service attached to a node, ticking every `interval` seconds while the node runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub kind: String,
    pub interval: f64,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A declared blackboard key, optionally with an initial value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySpec {
    pub key: String,
    pub kind: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<BbValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSpec {
    #[serde(default)]
    pub blackboard: Vec<KeySpec>,
    pub root: NodeSpec,
    #[serde(default)]
    pub config: TreeConfig,
}

pub type NodeFactory =
    Box<dyn Fn(&NodeSpec, Vec<Box<dyn Node>>, &NodeRegistry) -> Result<Box<dyn Node>, BuildError>>;

pub type ServiceFactory = Box<dyn Fn(&ServiceSpec) -> Result<Box<dyn ServiceTask>, BuildError>>;

#[derive(Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, NodeFactory>,
    services: BTreeMap<String, ServiceFactory>,
    subtrees: BTreeMap<String, Rc<BehaviourTree>>,
}

impl NodeRegistry {
    /// An empty registry. Most callers want [`NodeRegistry::with_builtins`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("sequence", build_sequence);
        registry.register("selector", build_selector);
        registry.register("random_selector", build_random_selector);
        registry.register("parallel", build_parallel);

        registry.register("inverter", build_inverter);
        registry.register("succeeder", build_succeeder);
        registry.register("failer", build_failer);
        registry.register("repeater", build_repeater);
        registry.register("until_fail", build_until_fail);
        registry.register("cooldown", build_cooldown);
        registry.register("time_limit", build_time_limit);
        registry.register("probability", build_probability);
        registry.register("subtree", build_subtree);
        registry.register("blackboard_conditional", build_blackboard_conditional);

        registry.register("blackboard_condition", build_blackboard_condition);
        registry.register("wait", build_wait);
        registry.register("set_blackboard", build_set_blackboard);
        registry.register("log", build_log);
        registry.register("raise_event", build_raise_event);

        registry.register_service("timestamp", build_timestamp_service);
        registry.register_service("counter", build_counter_service);

        registry
    }

    /// Register (or replace) the factory for `kind`. The factory receives the already-built
    /// children; name and services are applied by the registry afterwards.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&NodeSpec, Vec<Box<dyn Node>>, &NodeRegistry) -> Result<Box<dyn Node>, BuildError>
            + 'static,
    {
        self.nodes.insert(kind.into(), Box::new(factory));
    }

    pub fn register_service<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&ServiceSpec) -> Result<Box<dyn ServiceTask>, BuildError> + 'static,
    {
        self.services.insert(kind.into(), Box::new(factory));
    }

    /// Make `template` available to `subtree` nodes as `name`.
    pub fn register_subtree(&mut self, name: impl Into<String>, template: Rc<BehaviourTree>) {
        self.subtrees.insert(name.into(), template);
    }

    pub fn subtree(&self, name: &str) -> Option<&Rc<BehaviourTree>> {
        self.subtrees.get(name)
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.nodes.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn service_kinds(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn build(&self, spec: &NodeSpec) -> Result<Box<dyn Node>, BuildError> {
        let factory = self
            .nodes
            .get(&spec.kind)
            .ok_or_else(|| BuildError::UnknownKind {
                kind: spec.kind.clone(),
            })?;

        let children = spec
            .children
            .iter()
            .map(|child| self.build(child))
            .collect::<Result<Vec<_>, _>>()?;

        let mut node = factory(spec, children, self)?;
        let core = node.core_mut();
        if let Some(name) = &spec.name {
            core.set_name(name.clone());
        }
        for service in &spec.services {
            core.add_service(self.build_service(service)?);
        }
        Ok(node)
    }

    pub fn build_service(&self, spec: &ServiceSpec) -> Result<ServiceNode, BuildError> {
        let factory = self
            .services
            .get(&spec.kind)
            .ok_or_else(|| BuildError::UnknownService {
                kind: spec.kind.clone(),
            })?;
        Ok(ServiceNode::from_boxed(spec.interval, factory(spec)?))
    }

    pub fn build_tree(&self, spec: &TreeSpec) -> Result<BehaviourTree, BuildError> {
        let mut blackboard = Blackboard::new();
        for key in &spec.blackboard {
            BbValue::declare(&mut blackboard, &key.key, key.kind);
            if let Some(default) = &key.default {
                coerce(default, key.kind)
                    .ok_or_else(|| BuildError::DefaultKind {
                        key: key.key.clone(),
                        expected: key.kind,
                        found: default.kind(),
                    })?
                    .write(&mut blackboard, &key.key);
            }
        }

        let floats = spec
            .blackboard
            .iter()
            .filter(|key| key.kind == ValueKind::Float)
            .map(|key| key.key.as_str())
            .collect::<BTreeSet<_>>();
        let mut root_spec = spec.root.clone();
        widen_float_values(&mut root_spec, &floats);

        let root = self.build(&root_spec)?;
        tracing::debug!(
            root = %spec.root.kind,
            keys = spec.blackboard.len(),
            "tree built from document"
        );
        Ok(BehaviourTree::from_boxed(root)
            .with_blackboard(blackboard)
            .with_config(spec.config.clone()))
    }

    pub fn from_json(&self, json: &str) -> Result<BehaviourTree, BuildError> {
        let spec: TreeSpec = serde_json::from_str(json)?;
        self.build_tree(&spec)
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("subtrees", &self.subtrees.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Authored numbers are untyped; widen an int default declared as a float.
fn coerce(value: &BbValue, kind: ValueKind) -> Option<BbValue> {
    match (value, kind) {
        (BbValue::Int(v), ValueKind::Float) => Some(BbValue::Float(*v as f64)),
        (value, kind) if value.kind() == kind => Some(value.clone()),
        _ => None,
    }
}

/// Rewrite an integer `value` param as a float wherever the node's `key` is declared float,
/// so authored `1` compares and writes as `1.0`.
fn widen_float_values(spec: &mut NodeSpec, floats: &BTreeSet<&str>) {
    if let Some(params) = spec.params.as_object_mut() {
        let float_key = params
            .get("key")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|key| floats.contains(key));
        if float_key {
            if let Some(value) = params.get_mut("value") {
                if let Some(int) = value.as_i64() {
                    *value = serde_json::Value::from(int as f64);
                }
            }
        }
    }
    for child in &mut spec.children {
        widen_float_values(child, floats);
    }
}

/// Deserialize `params`, treating a missing/null object as `{}`.
pub fn params<T: DeserializeOwned>(kind: &str, params: &serde_json::Value) -> Result<T, BuildError> {
    let value = if params.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        params.clone()
    };
    serde_json::from_value(value).map_err(|source| BuildError::InvalidParams {
        kind: kind.to_owned(),
        source,
    })
}

fn no_children(spec: &NodeSpec, children: &[Box<dyn Node>]) -> Result<(), BuildError> {
    if children.is_empty() {
        Ok(())
    } else {
        Err(BuildError::ChildCount {
            kind: spec.kind.clone(),
            expected: "no",
            found: children.len(),
        })
    }
}

fn at_most_one_child(
    spec: &NodeSpec,
    mut children: Vec<Box<dyn Node>>,
) -> Result<Option<Box<dyn Node>>, BuildError> {
    if children.len() > 1 {
        return Err(BuildError::ChildCount {
            kind: spec.kind.clone(),
            expected: "at most one",
            found: children.len(),
        });
    }
    Ok(children.pop())
}

fn build_sequence(
    _spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    Ok(Box::new(Sequence::new(children)))
}

fn build_selector(
    _spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    Ok(Box::new(Selector::new(children)))
}

fn build_random_selector(
    _spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    Ok(Box::new(RandomSelector::new(children)))
}

#[derive(Deserialize)]
struct ParallelParams {
    #[serde(default = "default_success_policy")]
    success_policy: ParallelPolicy,
    #[serde(default = "default_failure_policy")]
    failure_policy: ParallelPolicy,
}

fn default_success_policy() -> ParallelPolicy {
    ParallelPolicy::RequireAll
}

fn default_failure_policy() -> ParallelPolicy {
    ParallelPolicy::RequireOne
}

fn build_parallel(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    let p: ParallelParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(Parallel::new(
        children,
        p.success_policy,
        p.failure_policy,
    )))
}

fn build_inverter(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    Ok(Box::new(Inverter::new(at_most_one_child(spec, children)?)))
}

fn build_succeeder(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    Ok(Box::new(Succeeder::new(at_most_one_child(spec, children)?)))
}

fn build_failer(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    Ok(Box::new(Failer::new(at_most_one_child(spec, children)?)))
}

#[derive(Deserialize)]
struct RepeaterParams {
    #[serde(default)]
    repeat_count: u32,
    #[serde(default)]
    stop_on_failure: bool,
}

fn build_repeater(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    let p: RepeaterParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(Repeater::new(
        at_most_one_child(spec, children)?,
        p.repeat_count,
        p.stop_on_failure,
    )))
}

fn build_until_fail(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    Ok(Box::new(UntilFail::new(at_most_one_child(spec, children)?)))
}

#[derive(Deserialize)]
struct DurationParams {
    duration: f64,
}

#[derive(Deserialize)]
struct CooldownParams {
    duration: f64,
    #[serde(default = "default_cooldown_state")]
    cooldown_return_state: NodeState,
}

fn default_cooldown_state() -> NodeState {
    NodeState::Failure
}

fn build_cooldown(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    let p: CooldownParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(Cooldown::new(
        at_most_one_child(spec, children)?,
        p.duration,
        p.cooldown_return_state,
    )))
}

fn build_time_limit(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    let p: DurationParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(TimeLimit::new(
        at_most_one_child(spec, children)?,
        p.duration,
    )))
}

#[derive(Deserialize)]
struct ProbabilityParams {
    chance: f64,
}

fn build_probability(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    let p: ProbabilityParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(Probability::new(
        at_most_one_child(spec, children)?,
        p.chance,
    )))
}

#[derive(Deserialize)]
struct SubTreeParams {
    tree: String,
}

fn build_subtree(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    no_children(spec, &children)?;
    let p: SubTreeParams = params(&spec.kind, &spec.params)?;
    let template = registry
        .subtree(&p.tree)
        .ok_or(BuildError::UnknownSubtree { name: p.tree.clone() })?;
    Ok(Box::new(SubTree::new(Rc::clone(template))))
}

#[derive(Deserialize)]
struct ConditionalParams {
    key: String,
    op: CompareOp,
    #[serde(default)]
    value: Option<BbValue>,
    #[serde(default)]
    abort_mode: AbortMode,
}

fn build_blackboard_conditional(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    let p: ConditionalParams = params(&spec.kind, &spec.params)?;
    let comparison = Comparison {
        key: p.key,
        op: p.op,
        value: p.value,
    };
    Ok(Box::new(BlackboardConditional::new(
        comparison,
        p.abort_mode,
        at_most_one_child(spec, children)?,
    )))
}

fn build_blackboard_condition(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    no_children(spec, &children)?;
    let comparison: Comparison = params(&spec.kind, &spec.params)?;
    Ok(Box::new(BlackboardCondition::new(comparison)))
}

fn build_wait(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    no_children(spec, &children)?;
    let p: DurationParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(Wait::new(p.duration)))
}

#[derive(Deserialize)]
struct SetBlackboardParams {
    key: String,
    value: BbValue,
}

fn build_set_blackboard(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    no_children(spec, &children)?;
    let p: SetBlackboardParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(SetBlackboard::new(p.key, p.value)))
}

#[derive(Deserialize)]
struct LogParams {
    message: String,
    #[serde(default)]
    level: LogLevel,
}

fn build_log(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    no_children(spec, &children)?;
    let p: LogParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(Log::new(p.message, p.level)))
}

#[derive(Deserialize)]
struct RaiseEventParams {
    channel: String,
    #[serde(default = "PayloadSource::signal")]
    payload: PayloadSource,
}

fn build_raise_event(
    spec: &NodeSpec,
    children: Vec<Box<dyn Node>>,
    _registry: &NodeRegistry,
) -> Result<Box<dyn Node>, BuildError> {
    no_children(spec, &children)?;
    let p: RaiseEventParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(RaiseEvent::new(p.channel, p.payload)))
}

#[derive(Deserialize)]
struct KeyParams {
    key: String,
}

fn build_timestamp_service(spec: &ServiceSpec) -> Result<Box<dyn ServiceTask>, BuildError> {
    let p: KeyParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(TimestampService::new(p.key)))
}

#[derive(Deserialize)]
struct CounterParams {
    key: String,
    #[serde(default = "default_step")]
    step: i64,
}

fn default_step() -> i64 {
    1
}

fn build_counter_service(spec: &ServiceSpec) -> Result<Box<dyn ServiceTask>, BuildError> {
    let p: CounterParams = params(&spec.kind, &spec.params)?;
    Ok(Box::new(CounterService::new(p.key, p.step)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_builtin_kind_is_registered() {
        let registry = NodeRegistry::with_builtins();
        for kind in [
            "sequence",
            "selector",
            "random_selector",
            "parallel",
            "inverter",
            "succeeder",
            "failer",
            "repeater",
            "until_fail",
            "cooldown",
            "time_limit",
            "probability",
            "subtree",
            "blackboard_conditional",
            "blackboard_condition",
            "wait",
            "set_blackboard",
            "log",
            "raise_event",
        ] {
            assert!(registry.contains(kind), "missing {kind}");
        }
        assert_eq!(
            registry.service_kinds().collect::<Vec<_>>(),
            vec!["counter", "timestamp"]
        );
    }

    #[test]
    fn null_params_read_as_empty_object() {
        let p: RepeaterParams = params("repeater", &serde_json::Value::Null).unwrap();
        assert_eq!(p.repeat_count, 0);
        assert!(!p.stop_on_failure);
    }

    #[test]
    fn int_defaults_widen_to_float() {
        assert_eq!(
            coerce(&BbValue::Int(2), ValueKind::Float),
            Some(BbValue::Float(2.0))
        );
        assert_eq!(coerce(&BbValue::Float(2.0), ValueKind::Int), None);
        assert_eq!(
            coerce(&BbValue::Text("a".into()), ValueKind::Text),
            Some(BbValue::Text("a".into()))
        );
    }
}
