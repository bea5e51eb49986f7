use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::{derive_seed, Entity, EventSink, RandomSource, SplitMix64, TimerFacility};

/// Everything a tree instance needs from its host, passed in explicitly at bind time.
///
/// Cloning shares the same collaborators.
#[derive(Clone)]
pub struct Bindings {
    pub owner: Rc<dyn Entity>,
    pub timer: Rc<RefCell<dyn TimerFacility>>,
    pub rng: Rc<RefCell<dyn RandomSource>>,
    pub events: Option<Rc<RefCell<dyn EventSink>>>,
}

impl Bindings {
    pub fn new(
        owner: Rc<dyn Entity>,
        timer: Rc<RefCell<dyn TimerFacility>>,
        rng: Rc<RefCell<dyn RandomSource>>,
    ) -> Self {
        Self {
            owner,
            timer,
            rng,
            events: None,
        }
    }

    /// Bindings with a [`SplitMix64`] stream derived from the owner's stable id.
    pub fn seeded(
        owner: Rc<dyn Entity>,
        timer: Rc<RefCell<dyn TimerFacility>>,
        global_seed: u64,
    ) -> Self {
        let seed = derive_seed(global_seed, owner.stable_id(), 0);
        Self::new(owner, timer, Rc::new(RefCell::new(SplitMix64::new(seed))))
    }

    pub fn with_events(mut self, events: Rc<RefCell<dyn EventSink>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn now(&self) -> f64 {
        self.timer.borrow().now()
    }
}

impl fmt::Debug for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bindings")
            .field("owner", &self.owner.stable_id())
            .field("events", &self.events.is_some())
            .finish()
    }
}
