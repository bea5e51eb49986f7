use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use crate::BlackboardError;

/// Anything that can be stored on a [`Blackboard`].
///
/// Implemented for every `'static + Clone + Debug` type; the clone hook is what lets a tree
/// template hand each runtime instance its own copy of the initial values.
pub trait BlackboardValue: Any + fmt::Debug {
    fn clone_value(&self) -> Box<dyn BlackboardValue>;
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T> BlackboardValue for T
where
    T: Any + Clone + fmt::Debug,
{
    fn clone_value(&self) -> Box<dyn BlackboardValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Declared type of a key, kept for tooling and schema introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueType {
    pub id: TypeId,
    pub name: &'static str,
}

impl ValueType {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

/// Typed handle for a string key.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BbKey<T: 'static> {
    name: &'static str,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: 'static> Copy for BbKey<T> {}

impl<T: 'static> Clone for BbKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> BbKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    pub fn name(self) -> &'static str {
        self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

/// A single key mutation, as seen by listeners.
///
/// `new` is `None` when the key was removed.
pub struct BlackboardChange<'a> {
    pub key: &'a str,
    pub old: Option<&'a dyn Any>,
    pub new: Option<&'a dyn Any>,
}

impl BlackboardChange<'_> {
    pub fn old_as<T: Any>(&self) -> Option<&T> {
        self.old?.downcast_ref()
    }

    pub fn new_as<T: Any>(&self) -> Option<&T> {
        self.new?.downcast_ref()
    }
}

type Callback = Box<dyn FnMut(&BlackboardChange<'_>)>;

struct Listener {
    id: ListenerId,
    callback: Callback,
}

/// Per-tree key/value store with change notification.
///
/// Listeners get a read-only view of each change and cannot write back into the blackboard,
/// so a notification can never re-enter `set`.
#[derive(Default)]
pub struct Blackboard {
    values: BTreeMap<String, Box<dyn BlackboardValue>>,
    types: BTreeMap<String, ValueType>,
    listeners: BTreeMap<String, Vec<Listener>>,
    next_listener: u64,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Record the type a key is expected to hold without writing a value.
    pub fn declare<T: Any>(&mut self, key: &str) {
        self.types.insert(key.to_owned(), ValueType::of::<T>());
    }

    pub fn value_type(&self, key: &str) -> Option<ValueType> {
        self.types.get(key).copied()
    }

    pub fn schema(&self) -> impl Iterator<Item = (&str, ValueType)> {
        self.types.iter().map(|(k, t)| (k.as_str(), *t))
    }

    pub fn set<T: BlackboardValue>(&mut self, key: &str, value: T) {
        self.types.insert(key.to_owned(), ValueType::of::<T>());
        self.insert_boxed(key, Box::new(value));
    }

    pub fn get<T: Any>(&self, key: &str) -> Result<&T, BlackboardError> {
        let value = self.erased(key).ok_or_else(|| BlackboardError::KeyMissing {
            key: key.to_owned(),
        })?;
        value
            .as_any()
            .downcast_ref::<T>()
            .ok_or_else(|| BlackboardError::TypeMismatch {
                key: key.to_owned(),
                expected: type_name::<T>(),
                found: value.type_name(),
            })
    }

    /// Non-failing lookup: `None` for both a missing key and a type mismatch.
    pub fn try_get<T: Any>(&self, key: &str) -> Option<&T> {
        self.erased(key)?.as_any().downcast_ref::<T>()
    }

    /// Type-erased view of a stored value.
    pub fn erased(&self, key: &str) -> Option<&dyn BlackboardValue> {
        self.values.get(key).map(|v| &**v)
    }

    pub fn read<T: Any>(&self, key: BbKey<T>) -> Option<&T> {
        self.try_get(key.name)
    }

    pub fn write<T: BlackboardValue>(&mut self, key: BbKey<T>, value: T) {
        self.set(key.name, value);
    }

    /// Remove a value. The declared type stays in the schema.
    pub fn remove(&mut self, key: &str) -> bool {
        let Some(old) = self.values.remove(key) else {
            return false;
        };
        let old: &dyn BlackboardValue = &*old;
        self.notify(key, Some(old.as_any()));
        true
    }

    pub fn clear(&mut self) {
        let keys: Vec<String> = self.values.keys().cloned().collect();
        for key in keys {
            self.remove(&key);
        }
    }

    /// Copy over every value (and declared type) of `other` whose key is absent here.
    pub fn seed_missing_from(&mut self, other: &Blackboard) {
        for (key, ty) in &other.types {
            self.types.entry(key.clone()).or_insert(*ty);
        }
        for (key, value) in &other.values {
            if !self.values.contains_key(key) {
                let value: &dyn BlackboardValue = &**value;
                self.insert_boxed(key, value.clone_value());
            }
        }
    }

    pub fn observe(
        &mut self,
        key: &str,
        callback: impl FnMut(&BlackboardChange<'_>) + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .entry(key.to_owned())
            .or_default()
            .push(Listener {
                id,
                callback: Box::new(callback),
            });
        id
    }

    pub fn unobserve(&mut self, key: &str, id: ListenerId) -> bool {
        let Some(list) = self.listeners.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| l.id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.listeners.remove(key);
        }
        removed
    }

    pub fn listener_count(&self, key: &str) -> usize {
        self.listeners.get(key).map_or(0, Vec::len)
    }

    fn insert_boxed(&mut self, key: &str, value: Box<dyn BlackboardValue>) {
        let old = self.values.insert(key.to_owned(), value);
        let old: Option<&dyn BlackboardValue> = old.as_deref();
        self.notify(key, old.map(|v| v.as_any()));
    }

    fn notify(&mut self, key: &str, old: Option<&dyn Any>) {
        let Some(listeners) = self.listeners.get_mut(key) else {
            return;
        };
        let new = self.values.get(key).map(|v| {
            let v: &dyn BlackboardValue = &**v;
            v.as_any()
        });
        tracing::trace!(key, listeners = listeners.len(), "blackboard change");
        let change = BlackboardChange { key, old, new };
        for listener in listeners.iter_mut() {
            (listener.callback)(&change);
        }
    }
}

impl Clone for Blackboard {
    /// Deep-copies values and schema. Listeners belong to the instance that registered them
    /// and are not carried over.
    fn clone(&self) -> Self {
        let values = self
            .values
            .iter()
            .map(|(k, v)| {
                let v: &dyn BlackboardValue = &**v;
                (k.clone(), v.clone_value())
            })
            .collect();
        Self {
            values,
            types: self.types.clone(),
            listeners: BTreeMap::new(),
            next_listener: 0,
        }
    }
}

impl fmt::Debug for Blackboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blackboard")
            .field("values", &self.values)
            .field(
                "listeners",
                &self
                    .listeners
                    .iter()
                    .map(|(k, l)| (k.as_str(), l.len()))
                    .collect::<BTreeMap<_, _>>(),
            )
            .finish()
    }
}
