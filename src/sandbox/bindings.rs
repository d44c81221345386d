//! Named caller-held handles
//!
//! Scenarios keep their handles in [`Bindings`], the sandbox's equivalent of
//! local variables. Order is preserved so the viewer lists them in the order
//! they were introduced.

use super::errors::SandboxError;
use crate::memory::handle::{ExclusiveHandle, HandleId, HandleKind, NodeId, SharedHandle, WeakHandle};
use crate::memory::value::Value;

/// A handle bound to a name
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Binding {
    Shared(SharedHandle<Value>),
    Weak(WeakHandle<Value>),
    Exclusive(ExclusiveHandle<Value>),
}

impl Binding {
    pub fn id(&self) -> HandleId {
        match self {
            Binding::Shared(h) => h.id(),
            Binding::Weak(h) => h.id(),
            Binding::Exclusive(h) => h.id(),
        }
    }

    pub fn node(&self) -> NodeId {
        match self {
            Binding::Shared(h) => h.node(),
            Binding::Weak(h) => h.node(),
            Binding::Exclusive(h) => h.node(),
        }
    }

    pub fn kind(&self) -> HandleKind {
        match self {
            Binding::Shared(_) => HandleKind::Shared,
            Binding::Weak(_) => HandleKind::Weak,
            Binding::Exclusive(_) => HandleKind::Exclusive,
        }
    }
}

impl From<SharedHandle<Value>> for Binding {
    fn from(handle: SharedHandle<Value>) -> Self {
        Binding::Shared(handle)
    }
}

impl From<WeakHandle<Value>> for Binding {
    fn from(handle: WeakHandle<Value>) -> Self {
        Binding::Weak(handle)
    }
}

impl From<ExclusiveHandle<Value>> for Binding {
    fn from(handle: ExclusiveHandle<Value>) -> Self {
        Binding::Exclusive(handle)
    }
}

/// Ordered name → handle table
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: Vec<(String, Binding)>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name, replacing an earlier binding in place
    pub fn bind(&mut self, name: impl Into<String>, binding: impl Into<Binding>) {
        let name = name.into();
        let binding = binding.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = binding,
            None => self.entries.push((name, binding)),
        }
    }

    pub fn unbind(&mut self, name: &str) -> Option<Binding> {
        let position = self.entries.iter().position(|(existing, _)| existing == name)?;
        Some(self.entries.remove(position).1)
    }

    pub fn get(&self, name: &str) -> Result<Binding, SandboxError> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, binding)| *binding)
            .ok_or_else(|| SandboxError::UnboundName {
                name: name.to_string(),
            })
    }

    pub fn shared(&self, name: &str) -> Result<SharedHandle<Value>, SandboxError> {
        match self.get(name)? {
            Binding::Shared(handle) => Ok(handle),
            other => Err(mismatch(other, HandleKind::Shared)),
        }
    }

    pub fn weak(&self, name: &str) -> Result<WeakHandle<Value>, SandboxError> {
        match self.get(name)? {
            Binding::Weak(handle) => Ok(handle),
            other => Err(mismatch(other, HandleKind::Weak)),
        }
    }

    pub fn exclusive(&self, name: &str) -> Result<ExclusiveHandle<Value>, SandboxError> {
        match self.get(name)? {
            Binding::Exclusive(handle) => Ok(handle),
            other => Err(mismatch(other, HandleKind::Exclusive)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Binding)> {
        self.entries.iter().map(|(name, binding)| (name.as_str(), binding))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn mismatch(binding: Binding, expected: HandleKind) -> SandboxError {
    SandboxError::KindMismatch {
        handle: binding.id(),
        expected,
        found: binding.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::heap::Heap;

    #[test]
    fn test_rebinding_keeps_position() {
        let mut heap: Heap<Value> = Heap::default();
        let a = heap.create_shared("a", Value::Int(1)).unwrap();
        let b = heap.create_exclusive("b", Value::Int(2)).unwrap();
        let weak = heap.weak_from(&a).unwrap();

        let mut bindings = Bindings::new();
        bindings.bind("a", a);
        bindings.bind("b", b);
        bindings.bind("a", weak);

        let names: Vec<&str> = bindings.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(bindings.weak("a"), Ok(weak));
        assert_eq!(
            bindings.shared("b"),
            Err(SandboxError::KindMismatch {
                handle: b.id(),
                expected: HandleKind::Shared,
                found: HandleKind::Exclusive
            })
        );
        assert_eq!(
            bindings.get("c"),
            Err(SandboxError::UnboundName {
                name: "c".to_string()
            })
        );
        assert_eq!(bindings.unbind("b"), Some(Binding::Exclusive(b)));
        assert_eq!(bindings.len(), 1);
    }
}
