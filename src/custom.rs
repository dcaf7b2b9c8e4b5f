//! Host-extensible custom data: the reference-counted holder behind `Value::Custom`
//! and the per-module `CustomType` registry.
//!
//! Splits "what the value looks like" from "how it's shared", except Pulsar's
//! custom data is fully opaque to the core. The core only knows a type id and
//! a shared handle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Opaque, host-provided payload behind a `Value::Custom`.
///
/// The core never inspects the contents; it only clones the handle (shared) or
/// asks the holder to `fork` itself when a sandboxed copy of an `ExecutionContext`
/// is needed.
pub trait CustomData: fmt::Debug {
    /// Produces an isolated copy of this data for a forked execution context.
    ///
    /// Returning `None` (the default) means the data is inherently shared and
    /// does not need isolation: the fork will alias the same handle.
    fn fork(&self) -> Option<CustomHandle> {
        None
    }
}

/// Shared handle to a [`CustomData`] instance. Cloning shares the same holder.
pub type CustomHandle = Rc<RefCell<dyn CustomData>>;

/// A registered custom type: an id, a diagnostic name, and a factory that
/// produces the type's global shared data when an `ExecutionContext` is built.
pub struct CustomType {
    pub id: u64,
    pub name: String,
    factory: Rc<dyn Fn() -> CustomHandle>,
}

impl CustomType {
    pub fn new(id: u64, name: impl Into<String>, factory: impl Fn() -> CustomHandle + 'static) -> Self {
        Self { id, name: name.into(), factory: Rc::new(factory) }
    }

    /// Instantiates this type's global data, as done once per `ExecutionContext`.
    #[must_use]
    pub fn instantiate(&self) -> CustomHandle {
        (self.factory)()
    }
}

impl fmt::Debug for CustomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomType").field("id", &self.id).field("name", &self.name).finish_non_exhaustive()
    }
}

/// A value-level instance of custom data: a type tag plus a shared handle.
///
/// Equality is structural identity: two `CustomValue`s are equal iff both the
/// `type_id` matches and the handles point at the same allocation.
#[derive(Clone, Debug)]
pub struct CustomValue {
    pub type_id: u64,
    pub data: CustomHandle,
}

impl CustomValue {
    #[must_use]
    pub fn new(type_id: u64, data: CustomHandle) -> Self {
        Self { type_id, data }
    }
}

impl PartialEq for CustomValue {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && Rc::ptr_eq(&self.data, &other.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Counter(RefCell<i64>);
    impl CustomData for Counter {}

    #[test]
    fn equality_is_identity_and_type() {
        let handle: CustomHandle = Rc::new(RefCell::new(Counter(RefCell::new(0))));
        let a = CustomValue::new(1, Rc::clone(&handle));
        let b = CustomValue::new(1, Rc::clone(&handle));
        assert_eq!(a, b);

        let other_handle: CustomHandle = Rc::new(RefCell::new(Counter(RefCell::new(0))));
        let c = CustomValue::new(1, other_handle);
        assert_ne!(a, c);

        let d = CustomValue::new(2, Rc::clone(&handle));
        assert_ne!(a, d);
    }

    #[test]
    fn default_fork_is_none() {
        let counter = Counter(RefCell::new(0));
        assert!(counter.fork().is_none());
    }
}
