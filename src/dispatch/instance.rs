//! Object instances and the method receiver

use super::call::{self, Call, Start, Target};
use super::registry::{Layout, TypeRegistry};
use crate::memory::handle::{HandleKind, NodeId};
use crate::memory::heap::Heap;
use crate::memory::value::{ObjectRef, Value};
use crate::sandbox::errors::SandboxError;
use rustc_hash::FxHashMap;

/// An object: its dynamic class and one field table per sub-object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Instance {
    class: String,
    subobjects: Vec<FxHashMap<String, Value>>,
}

impl Instance {
    pub(crate) fn new(class: String, subobjects: Vec<FxHashMap<String, Value>>) -> Self {
        Instance { class, subobjects }
    }

    /// Get the dynamic class
    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn subobject_count(&self) -> usize {
        self.subobjects.len()
    }

    /// Get the field table of a sub-object
    pub fn fields_at(&self, index: usize) -> Option<&FxHashMap<String, Value>> {
        self.subobjects.get(index)
    }

    pub(crate) fn field_at(&self, index: usize, name: &str) -> Option<&Value> {
        self.subobjects.get(index)?.get(name)
    }

    pub(crate) fn field_at_mut(&mut self, index: usize, name: &str) -> Option<&mut Value> {
        self.subobjects.get_mut(index)?.get_mut(name)
    }
}

/// The heap around an object whose method is running
pub(crate) struct Scope<'a> {
    heap: &'a mut Heap<Value>,
    node: NodeId,
    active: &'a [NodeId],
}

impl<'a> Scope<'a> {
    pub(crate) fn new(heap: &'a mut Heap<Value>, node: NodeId, active: &'a [NodeId]) -> Self {
        Scope { heap, node, active }
    }

    fn reborrow(&mut self) -> Scope<'_> {
        Scope {
            heap: &mut *self.heap,
            node: self.node,
            active: self.active,
        }
    }
}

/// The object a method body runs against
///
/// The receiver is positioned at the sub-object whose class declared the
/// running method. Field names resolve from there, so a base method sees its
/// own fields even when a derived class declares a field with the same name.
///
/// Bodies invoked on a heap object can also reach other nodes: through the
/// object's relations ([`Receiver::call_field`]) or through a reference
/// argument ([`Receiver::call_ref`]). Destructors run after the object has
/// left the heap and only see its own fields.
pub struct Receiver<'a> {
    registry: &'a TypeRegistry,
    layout: &'a Layout,
    instance: &'a mut Instance,
    at: usize,
    output: &'a mut Vec<String>,
    scope: Option<Scope<'a>>,
}

impl<'a> Receiver<'a> {
    pub(crate) fn new(
        registry: &'a TypeRegistry,
        layout: &'a Layout,
        instance: &'a mut Instance,
        at: usize,
        output: &'a mut Vec<String>,
    ) -> Self {
        Receiver {
            registry,
            layout,
            instance,
            at,
            output,
            scope: None,
        }
    }

    pub(crate) fn with_scope(mut self, scope: Scope<'a>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Class of the complete object
    pub fn dynamic_class(&self) -> &str {
        self.instance.class()
    }

    /// Class that declared the running method
    pub fn declaring_class(&self) -> &str {
        self.layout
            .get(self.at)
            .map_or("", |info| info.class.as_str())
    }

    /// Read a field visible from the declaring class
    pub fn get(&self, field: &str) -> Result<Value, SandboxError> {
        let index = self.field_slot(field)?;
        self.instance
            .field_at(index, field)
            .cloned()
            .ok_or_else(|| self.unknown(field))
    }

    /// Write a field visible from the declaring class
    pub fn set(&mut self, field: &str, value: Value) -> Result<(), SandboxError> {
        let index = self.field_slot(field)?;
        match self.instance.field_at_mut(index, field) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.unknown(field)),
        }
    }

    /// Append a line to the sandbox terminal
    pub fn print(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    /// Call a method on this object from the declaring class
    ///
    /// Overridable methods run the dynamic type's final overrider, so a base
    /// method calling one reaches the derived override.
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value, SandboxError> {
        let registry = self.registry;
        let (at, def) = registry.resolve(self.layout, self.at, method, args)?;
        let body = def
            .body()
            .cloned()
            .ok_or_else(|| SandboxError::AbstractInstantiation {
                class: self.dynamic_class().to_string(),
                method: method.to_string(),
            })?;
        let mut nested = Receiver {
            registry,
            layout: self.layout,
            instance: &mut *self.instance,
            at,
            output: &mut *self.output,
            scope: self.scope.as_mut().map(Scope::reborrow),
        };
        (body.as_ref())(&mut nested, args)
    }

    /// Call a method on the node held in one of this object's relations
    pub fn call_field(
        &mut self,
        field: &str,
        view: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Value, SandboxError> {
        let missing = self.unknown(field);
        let Some(scope) = self.scope.as_mut() else {
            return Err(missing);
        };
        let edge = scope
            .heap
            .node(scope.node)
            .and_then(|node| node.field(field))
            .ok_or(missing)?;
        if !scope.heap.is_live(edge.target()) {
            return Err(match edge.kind() {
                HandleKind::Weak => SandboxError::ExpiredReference { handle: edge.id() },
                _ => SandboxError::UseAfterRelease { handle: edge.id() },
            });
        }
        let target = Target {
            handle: edge.id(),
            node: edge.target(),
        };
        let call = Call {
            start: Start::View(view),
            method,
            args,
            virtual_call: true,
        };
        call::invoke(self.registry, scope.heap, target, call, scope.active, self.output)
    }

    /// Call a virtual method through a reference argument
    ///
    /// The reference's view picks the declaration; the referenced object's
    /// dynamic class picks the overrider.
    pub fn call_ref(
        &mut self,
        reference: &ObjectRef,
        method: &str,
        args: &[Value],
    ) -> Result<Value, SandboxError> {
        let Some(scope) = self.scope.as_mut() else {
            return Err(SandboxError::ExpiredReference {
                handle: reference.handle,
            });
        };
        if !scope.heap.is_live(reference.node) {
            return Err(SandboxError::ExpiredReference {
                handle: reference.handle,
            });
        }
        let target = Target {
            handle: reference.handle,
            node: reference.node,
        };
        let call = Call {
            start: Start::View(&reference.view),
            method,
            args,
            virtual_call: true,
        };
        call::invoke(self.registry, scope.heap, target, call, scope.active, self.output)
    }

    // Private fields are only reachable from their own sub-object
    fn field_slot(&self, field: &str) -> Result<usize, SandboxError> {
        let index = self.registry.lookup(self.layout, self.at, field)?;
        self.registry
            .check_field_access(self.layout, index, field, Some(self.at))?;
        Ok(index)
    }

    fn unknown(&self, field: &str) -> SandboxError {
        SandboxError::UnknownMember {
            class: self.declaring_class().to_string(),
            member: field.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::registry::ClassDef;

    #[test]
    fn test_receiver_respects_privacy_of_bases() {
        let mut registry = TypeRegistry::new();
        registry
            .register(ClassDef::new("Account").private_field("balance", 10).field("owner", "ann"))
            .unwrap();
        registry
            .register(ClassDef::new("Savings").extends("Account"))
            .unwrap();

        let mut instance = registry.instantiate("Savings").unwrap();
        let layout = registry.layout("Savings").unwrap();
        let mut output = Vec::new();

        // From the derived sub-object the base's private field is off limits
        let mut derived = Receiver::new(&registry, layout, &mut instance, 0, &mut output);
        assert_eq!(
            derived.get("balance"),
            Err(SandboxError::AccessViolation {
                class: "Account".to_string(),
                field: "balance".to_string()
            })
        );
        assert_eq!(derived.get("owner"), Ok(Value::from("ann")));
        derived.set("owner", Value::from("bob")).unwrap();

        let mut base = Receiver::new(&registry, layout, &mut instance, 1, &mut output);
        base.set("balance", Value::Int(25)).unwrap();
        assert_eq!(base.get("balance"), Ok(Value::Int(25)));
        assert_eq!(base.declaring_class(), "Account");
        assert_eq!(base.dynamic_class(), "Savings");
        base.print("done");

        assert_eq!(instance.field_at(1, "owner"), Some(&Value::from("bob")));
        assert_eq!(output, vec!["done".to_string()]);
    }

    #[test]
    fn test_self_calls_dispatch_without_a_heap() {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                ClassDef::new("Shape")
                    .virtual_method("name", &[], |_, _| Ok(Value::from("shape")))
                    .method("describe", &[], |this, _| {
                        let name = this.call("name", &[])?;
                        this.print(format!("a {}", name.as_text().unwrap_or("?")));
                        Ok(Value::Unit)
                    }),
            )
            .unwrap();
        registry
            .register(
                ClassDef::new("Square")
                    .extends("Shape")
                    .virtual_method("name", &[], |_, _| Ok(Value::from("square"))),
            )
            .unwrap();

        let mut instance = registry.instantiate("Square").unwrap();
        let layout = registry.layout("Square").unwrap();
        let mut output = Vec::new();
        let mut base = Receiver::new(&registry, layout, &mut instance, 1, &mut output);

        base.call("describe", &[]).unwrap();
        assert!(matches!(
            base.call_field("engine", "Engine", "start", &[]),
            Err(SandboxError::UnknownMember { .. })
        ));
        assert_eq!(output, vec!["a square".to_string()]);
    }
}
