use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;

/// The game object a tree instance is bound to.
///
/// Leaf nodes query it for capabilities (locomotion, animation, ...). The core never prescribes
/// which capabilities exist; a node that needs one and does not find it fails.
pub trait Entity: 'static {
    /// Stable identifier used for seeding and logs.
    fn stable_id(&self) -> u64;

    fn capability(&self, _id: TypeId) -> Option<&dyn Any> {
        None
    }
}

impl dyn Entity {
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.capability(TypeId::of::<T>())?.downcast_ref()
    }

    pub fn has<T: Any>(&self) -> bool {
        self.get::<T>().is_some()
    }
}

impl Entity for u64 {
    fn stable_id(&self) -> u64 {
        *self
    }
}

impl Entity for u32 {
    fn stable_id(&self) -> u64 {
        *self as u64
    }
}

/// Ready-made entity: an id plus a bag of capabilities keyed by type.
///
/// Capabilities are handed out by shared reference; hosts that need nodes to drive them wrap
/// the state in `Cell`/`RefCell`.
#[derive(Default)]
pub struct Agent {
    id: u64,
    capabilities: BTreeMap<TypeId, Box<dyn Any>>,
}

impl Agent {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            capabilities: BTreeMap::new(),
        }
    }

    pub fn with<T: Any>(mut self, capability: T) -> Self {
        self.insert(capability);
        self
    }

    pub fn insert<T: Any>(&mut self, capability: T) {
        self.capabilities
            .insert(TypeId::of::<T>(), Box::new(capability));
    }
}

impl Entity for Agent {
    fn stable_id(&self) -> u64 {
        self.id
    }

    fn capability(&self, id: TypeId) -> Option<&dyn Any> {
        self.capabilities.get(&id).map(|c| &**c)
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities.len())
            .finish()
    }
}
