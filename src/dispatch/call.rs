//! Running a method against an object on the heap
//!
//! Both the sandbox facade and method bodies (calling through a field or a
//! reference argument) end up here. The object's payload is taken out of its
//! heap slot while its method runs, so the body can reach other nodes
//! through the heap. A call that comes back around to an object whose method
//! is still running fails with [`SandboxError::ReentrantCall`].

use super::instance::{Receiver, Scope};
use super::registry::{Layout, TypeRegistry};
use crate::memory::handle::{HandleId, NodeId};
use crate::memory::heap::Heap;
use crate::memory::value::Value;
use crate::sandbox::errors::SandboxError;
use tracing::debug;

/// Where member lookup starts in the dynamic type
#[derive(Debug, Clone, Copy)]
pub(crate) enum Start<'a> {
    /// The unique sub-object of a class
    View(&'a str),
    /// A qualified path from the most-derived class
    Path(&'a [&'a str]),
}

impl Start<'_> {
    pub(crate) fn locate(&self, class: &str, layout: &Layout) -> Result<usize, SandboxError> {
        match self {
            Start::View(view) => layout.upcast(view),
            Start::Path(path) => layout.navigate(path).ok_or_else(|| SandboxError::InvalidCast {
                from: class.to_string(),
                to: path.join("::"),
            }),
        }
    }
}

/// A method call as written at the call site
#[derive(Debug, Clone, Copy)]
pub(crate) struct Call<'a> {
    pub start: Start<'a>,
    pub method: &'a str,
    pub args: &'a [Value],
    /// Run the final overrider instead of the declaration the view sees
    pub virtual_call: bool,
}

/// The object a call runs on; the handle is only used in errors
#[derive(Debug, Clone, Copy)]
pub(crate) struct Target {
    pub handle: HandleId,
    pub node: NodeId,
}

/// Resolve `call` against the object at `target` and run its body
///
/// `active` lists the nodes whose methods are already running further up
/// the call chain.
pub(crate) fn invoke(
    registry: &TypeRegistry,
    heap: &mut Heap<Value>,
    target: Target,
    call: Call<'_>,
    active: &[NodeId],
    output: &mut Vec<String>,
) -> Result<Value, SandboxError> {
    if active.contains(&target.node) {
        return Err(SandboxError::ReentrantCall {
            handle: target.handle,
        });
    }
    let class = heap
        .node(target.node)
        .and_then(|node| node.value.as_object())
        .map(|instance| instance.class().to_string())
        .ok_or(SandboxError::NotAnObject {
            handle: target.handle,
        })?;

    let layout = registry.layout(&class)?;
    let from = call.start.locate(&class, layout)?;
    let (at, def) = if call.virtual_call {
        registry.resolve(layout, from, call.method, call.args)?
    } else {
        registry.resolve_static(layout, from, call.method, call.args)?
    };
    debug!(
        class = %class,
        method = %def.signature(),
        declared_in = %layout.get(at).map_or("", |info| info.class.as_str()),
        "resolved call"
    );
    let body = def
        .body()
        .cloned()
        .ok_or_else(|| SandboxError::AbstractInstantiation {
            class: class.clone(),
            method: call.method.to_string(),
        })?;

    let mut instance = match heap.value_mut(target.node) {
        Some(Value::Object(instance)) => std::mem::take(instance),
        _ => {
            return Err(SandboxError::NotAnObject {
                handle: target.handle,
            })
        }
    };

    let mut chain = active.to_vec();
    chain.push(target.node);
    let result = {
        let scope = Scope::new(&mut *heap, target.node, &chain);
        let mut receiver = Receiver::new(registry, layout, &mut instance, at, output).with_scope(scope);
        (body.as_ref())(&mut receiver, call.args)
    };

    if let Some(Value::Object(slot)) = heap.value_mut(target.node) {
        *slot = instance;
    }
    result
}
