//! The sandbox facade
//!
//! [`Sandbox`] ties the heap, the type registry and the captured terminal
//! together. Objects are heap nodes whose payload is an [`Instance`]; calls
//! go through a *view* (the class the caller sees the object as) and resolve
//! with the registry before the method body runs against the object.
//!
//! When an object node is destroyed its class destructors run, and their
//! output is echoed right after the node's `~label` line.
//!
//! [`Instance`]: crate::dispatch::instance::Instance

use crate::config::SandboxConfig;
use crate::dispatch::call::{self, Call, Start, Target};
use crate::dispatch::registry::{ClassDef, TypeRegistry};
use crate::memory::handle::{ExclusiveHandle, Handle, SharedHandle};
use crate::memory::heap::{Heap, TeardownPhase};
use crate::memory::value::{ObjectRef, Value};
use crate::sandbox::errors::SandboxError;
use crate::snapshot::Terminal;
use tracing::debug;

/// Heap, classes and output of one sandbox run
#[derive(Debug)]
pub struct Sandbox {
    heap: Heap<Value>,
    registry: TypeRegistry,
    terminal: Terminal,
    teardown_cursor: usize,
    step: usize,
}

impl Sandbox {
    pub fn new(config: &SandboxConfig) -> Self {
        Sandbox {
            heap: Heap::new(config.max_nodes).with_reclaimed_payloads(),
            registry: TypeRegistry::new(),
            terminal: Terminal::new(),
            teardown_cursor: 0,
            step: 0,
        }
    }

    // ========== Accessors ==========

    /// Get a reference to the heap
    pub fn heap(&self) -> &Heap<Value> {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap<Value> {
        &mut self.heap
    }

    /// Get a reference to the type registry
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Get a reference to the terminal output
    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// Step that new terminal lines are attributed to
    pub fn set_step(&mut self, step: usize) {
        self.step = step;
    }

    // ========== Classes and objects ==========

    pub fn register(&mut self, class: ClassDef) -> Result<(), SandboxError> {
        self.registry.register(class)
    }

    /// Instantiate a class into a new shared node
    pub fn create_object(
        &mut self,
        label: impl Into<String>,
        class: &str,
    ) -> Result<SharedHandle<Value>, SandboxError> {
        let instance = self.registry.instantiate(class)?;
        self.heap.create_shared(label, Value::Object(instance))
    }

    /// Instantiate a class into a new exclusively owned node
    pub fn create_exclusive_object(
        &mut self,
        label: impl Into<String>,
        class: &str,
    ) -> Result<ExclusiveHandle<Value>, SandboxError> {
        let instance = self.registry.instantiate(class)?;
        self.heap.create_exclusive(label, Value::Object(instance))
    }

    /// Class of the object behind a handle
    pub fn class_of<H: Handle<Target = Value>>(&self, target: &H) -> Result<String, SandboxError> {
        self.heap
            .get(target)?
            .as_object()
            .map(|instance| instance.class().to_string())
            .ok_or(SandboxError::NotAnObject {
                handle: target.id(),
            })
    }

    /// A non-owning reference to an object, typed as `view`
    ///
    /// Passing it as an argument selects overloads by `view`, whatever the
    /// object's dynamic class.
    pub fn reference<H: Handle<Target = Value>>(
        &self,
        target: &H,
        view: &str,
    ) -> Result<Value, SandboxError> {
        let class = self.class_of(target)?;
        self.registry.layout(&class)?.upcast(view)?;
        Ok(Value::Ref(ObjectRef {
            handle: target.id(),
            node: target.node(),
            view: view.to_string(),
        }))
    }

    // ========== Dispatch ==========

    /// Call a method through a view of the object
    ///
    /// Overridable methods run the dynamic type's final overrider; others run
    /// the declaration the view resolves to.
    pub fn call<H: Handle<Target = Value>>(
        &mut self,
        target: &H,
        view: &str,
        method: &str,
        args: &[Value],
    ) -> Result<Value, SandboxError> {
        self.dispatch(target, Start::View(view), method, args, true)
    }

    /// Call a method by qualified path, bypassing overriders
    pub fn call_static<H: Handle<Target = Value>>(
        &mut self,
        target: &H,
        path: &[&str],
        method: &str,
        args: &[Value],
    ) -> Result<Value, SandboxError> {
        self.dispatch(target, Start::Path(path), method, args, false)
    }

    /// Whether the object has exactly one sub-object of `class`
    pub fn dynamic_cast<H: Handle<Target = Value>>(
        &self,
        target: &H,
        class: &str,
    ) -> Result<bool, SandboxError> {
        if self.registry.class(class).is_none() {
            return Err(SandboxError::UnknownClass {
                name: class.to_string(),
            });
        }
        let dynamic = self.class_of(target)?;
        let layout = self.registry.layout(&dynamic)?;
        Ok(layout.occurrences(class).len() == 1)
    }

    fn dispatch<H: Handle<Target = Value>>(
        &mut self,
        target: &H,
        start: Start<'_>,
        method: &str,
        args: &[Value],
        virtual_call: bool,
    ) -> Result<Value, SandboxError> {
        // Validates the handle's record before going by node id
        self.heap.get(target)?;
        let call = Call {
            start,
            method,
            args,
            virtual_call,
        };
        let target = Target {
            handle: target.id(),
            node: target.node(),
        };
        let mut output = Vec::new();
        let result = call::invoke(&self.registry, &mut self.heap, target, call, &[], &mut output);
        for line in output {
            self.terminal.print(line, self.step);
        }
        result
    }

    // ========== Fields ==========

    /// Read a public field through a view
    pub fn read_field<H: Handle<Target = Value>>(
        &self,
        target: &H,
        view: &str,
        field: &str,
    ) -> Result<Value, SandboxError> {
        self.read(target, Start::View(view), field)
    }

    /// Read a public field through a qualified path
    pub fn read_field_at<H: Handle<Target = Value>>(
        &self,
        target: &H,
        path: &[&str],
        field: &str,
    ) -> Result<Value, SandboxError> {
        self.read(target, Start::Path(path), field)
    }

    /// Write a public field through a view
    pub fn write_field<H: Handle<Target = Value>>(
        &mut self,
        target: &H,
        view: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), SandboxError> {
        self.write(target, Start::View(view), field, value.into())
    }

    /// Write a public field through a qualified path
    pub fn write_field_at<H: Handle<Target = Value>>(
        &mut self,
        target: &H,
        path: &[&str],
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), SandboxError> {
        self.write(target, Start::Path(path), field, value.into())
    }

    fn field_slot(&self, class: &str, start: Start<'_>, field: &str) -> Result<usize, SandboxError> {
        let layout = self.registry.layout(class)?;
        let from = start.locate(class, layout)?;
        let at = self.registry.lookup(layout, from, field)?;
        self.registry.check_field_access(layout, at, field, None)?;
        Ok(at)
    }

    fn read<H: Handle<Target = Value>>(
        &self,
        target: &H,
        start: Start<'_>,
        field: &str,
    ) -> Result<Value, SandboxError> {
        let class = self.class_of(target)?;
        let at = self.field_slot(&class, start, field)?;
        self.heap
            .get(target)?
            .as_object()
            .and_then(|instance| instance.field_at(at, field))
            .cloned()
            .ok_or_else(|| SandboxError::UnknownMember {
                class,
                member: field.to_string(),
            })
    }

    fn write<H: Handle<Target = Value>>(
        &mut self,
        target: &H,
        start: Start<'_>,
        field: &str,
        value: Value,
    ) -> Result<(), SandboxError> {
        let class = self.class_of(target)?;
        let at = self.field_slot(&class, start, field)?;
        let slot = self
            .heap
            .get_mut(target)?
            .as_object_mut()
            .and_then(|instance| instance.field_at_mut(at, field))
            .ok_or_else(|| SandboxError::UnknownMember {
                class: class.clone(),
                member: field.to_string(),
            })?;
        *slot = value;
        Ok(())
    }

    // ========== Output ==========

    pub fn print(&mut self, text: impl Into<String>) {
        self.terminal.print(text, self.step);
    }

    pub fn report_error(&mut self, err: &SandboxError) {
        self.terminal.error(format!("error: {}", err), self.step);
    }

    /// Echo teardowns since the last sync as `~Label` lines, indented by depth
    ///
    /// Each object's destructor output follows its `~Label` line at the same
    /// depth.
    pub fn sync_teardown(&mut self) {
        let mut reclaimed = self.heap.take_reclaimed();
        let events = self
            .heap
            .teardown_log()
            .get(self.teardown_cursor..)
            .unwrap_or(&[]);
        for (offset, event) in events.iter().enumerate() {
            if event.phase != TeardownPhase::Begin {
                continue;
            }
            let indent = "  ".repeat(event.depth);
            self.terminal
                .teardown(format!("{}~{}", indent, event.label), self.step);

            let index = self.teardown_cursor + offset;
            let Some(position) = reclaimed.iter().position(|r| r.event == index) else {
                continue;
            };
            let Value::Object(mut instance) = reclaimed.swap_remove(position).value else {
                continue;
            };
            let mut output = Vec::new();
            let result = self.registry.run_destructors(&mut instance, &mut output);
            for line in output {
                self.terminal.print(format!("{}{}", indent, line), self.step);
            }
            if let Err(err) = result {
                self.terminal.error(format!("{}error: {}", indent, err), self.step);
            }
        }
        self.teardown_cursor = self.heap.teardown_log().len();
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new(&SandboxConfig::default())
    }
}
