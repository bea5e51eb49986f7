#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use catalyst_bt::{Node, NodeCore, NodeState, TickContext};
use catalyst_core::{Bindings, Entity, ManualTimer, RandomSource};

/// Shared, ordered record of what scripted leaves saw: `start:x`, `update:x`, `abort:x`, `stop:x`.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

/// Leaf that replays `script` (cycling) and journals every lifecycle hook.
pub struct Scripted {
    core: NodeCore,
    name: &'static str,
    journal: Journal,
    script: Vec<NodeState>,
    next: usize,
}

impl Scripted {
    pub fn new(name: &'static str, journal: &Journal, script: Vec<NodeState>) -> Self {
        assert!(!script.is_empty());
        Self {
            core: NodeCore::named(name),
            name,
            journal: journal.clone(),
            script,
            next: 0,
        }
    }

    pub fn always(name: &'static str, journal: &Journal, state: NodeState) -> Self {
        Self::new(name, journal, vec![state])
    }

    pub fn boxed(self) -> Box<dyn Node> {
        Box::new(self)
    }
}

impl Node for Scripted {
    fn core(&self) -> &NodeCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut NodeCore {
        &mut self.core
    }

    fn kind(&self) -> &'static str {
        "scripted"
    }

    fn clone_node(&self) -> Box<dyn Node> {
        Box::new(Scripted {
            core: self.core.clone(),
            name: self.name,
            journal: self.journal.clone(),
            script: self.script.clone(),
            next: 0,
        })
    }

    fn on_start(&mut self, _ctx: &mut TickContext<'_>) {
        self.journal.record(format!("start:{}", self.name));
    }

    fn on_update(&mut self, _ctx: &mut TickContext<'_>) -> NodeState {
        self.journal.record(format!("update:{}", self.name));
        let state = self.script[self.next % self.script.len()];
        self.next += 1;
        state
    }

    fn on_abort(&mut self, _ctx: &mut TickContext<'_>) {
        self.journal.record(format!("abort:{}", self.name));
    }

    fn on_stop(&mut self, _ctx: &mut TickContext<'_>) {
        self.journal.record(format!("stop:{}", self.name));
    }
}

/// Random source whose unit draws are pinned; integer draws always pick `lo`.
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_u64(&mut self) -> u64 {
        0
    }

    fn next_unit(&mut self) -> f64 {
        self.0
    }
}

pub fn bindings(owner: u64) -> (Bindings, Rc<RefCell<ManualTimer>>) {
    bindings_for(Rc::new(owner))
}

pub fn bindings_for(owner: Rc<dyn Entity>) -> (Bindings, Rc<RefCell<ManualTimer>>) {
    let timer = Rc::new(RefCell::new(ManualTimer::new()));
    let bindings = Bindings::seeded(owner, timer.clone(), 7);
    (bindings, timer)
}

pub fn bindings_with_rng(
    owner: u64,
    rng: impl RandomSource + 'static,
) -> (Bindings, Rc<RefCell<ManualTimer>>) {
    let timer = Rc::new(RefCell::new(ManualTimer::new()));
    let bindings = Bindings::new(Rc::new(owner), timer.clone(), Rc::new(RefCell::new(rng)));
    (bindings, timer)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
