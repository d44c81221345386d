//! Class registry and member resolution
//!
//! Classes are declared with the [`ClassDef`] builder and registered in a
//! [`TypeRegistry`]. Registration computes the class's [`Layout`]: a tree of
//! sub-objects with one entry per base path, except that *shared* bases are
//! placed once and referenced from every path that reaches them.
//!
//! # Resolution
//!
//! ```text
//! lookup      member name  → the dominant sub-object declaring it (or ambiguity)
//! overload    argument kinds → the declaration with matching parameters
//! overrider   overridable? → the most-derived declaration in the dynamic type
//! ```
//!
//! Lookup and overload selection only ever look at the view a call is made
//! through. The dynamic type participates only when the selected declaration
//! is overridable.
//!
//! Overloads prefer an exact match of the argument kinds. Failing that, an
//! object argument may convert to a unique base view, and the overload with
//! the most derived parameters wins.
//!
//! # Destruction
//!
//! Destructors run from the most-derived class towards its bases, in reverse
//! base declaration order. Shared bases are destroyed once, after everything
//! else.

use super::instance::{Instance, Receiver};
use crate::memory::value::{describe_kinds, Value, ValueKind};
use crate::sandbox::errors::SandboxError;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Body of a method: receives the object (positioned at the declaring
/// sub-object) and the call arguments
pub type MethodBody = Rc<dyn Fn(&mut Receiver<'_>, &[Value]) -> Result<Value, SandboxError>>;

/// Field visibility from outside the declaring class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// A field declaration with its initial value
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub default: Value,
    pub visibility: Visibility,
}

/// A direct base of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSpec {
    pub class: String,
    /// Shared bases get a single sub-object no matter how many paths reach them
    pub shared: bool,
}

/// A method declaration; no body means pure
#[derive(Clone)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<ValueKind>,
    pub overridable: bool,
    body: Option<MethodBody>,
}

impl MethodDef {
    pub fn is_pure(&self) -> bool {
        self.body.is_none()
    }

    pub fn body(&self) -> Option<&MethodBody> {
        self.body.as_ref()
    }

    /// Whether the static kinds of `args` match the parameter list exactly
    pub fn accepts(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args)
                .all(|(param, arg)| *param == arg.kind())
    }

    pub fn same_signature(&self, other: &MethodDef) -> bool {
        self.name == other.name && self.params == other.params
    }

    /// `name(int, float)`
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, params)
    }
}

impl fmt::Debug for MethodDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDef")
            .field("signature", &self.signature())
            .field("overridable", &self.overridable)
            .field("pure", &self.is_pure())
            .finish()
    }
}

/// Class declaration builder
#[derive(Debug, Clone)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<BaseSpec>,
    pub fields: Vec<FieldDef>,
    pub methods: Vec<MethodDef>,
    pub destructor: Option<MethodDef>,
}

impl ClassDef {
    pub fn new(name: impl Into<String>) -> Self {
        ClassDef {
            name: name.into(),
            bases: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            destructor: None,
        }
    }

    /// Add a base with its own sub-object per path
    pub fn extends(mut self, base: impl Into<String>) -> Self {
        self.bases.push(BaseSpec {
            class: base.into(),
            shared: false,
        });
        self
    }

    /// Add a base that is shared by every path reaching it
    pub fn extends_shared(mut self, base: impl Into<String>) -> Self {
        self.bases.push(BaseSpec {
            class: base.into(),
            shared: true,
        });
        self
    }

    pub fn field(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.push_field(name.into(), default.into(), Visibility::Public)
    }

    pub fn private_field(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.push_field(name.into(), default.into(), Visibility::Private)
    }

    /// Non-overridable method; calls bind to the view's declaration
    pub fn method<F>(self, name: impl Into<String>, params: &[ValueKind], body: F) -> Self
    where
        F: Fn(&mut Receiver<'_>, &[Value]) -> Result<Value, SandboxError> + 'static,
    {
        self.push_method(name.into(), params, false, Some(Rc::new(body)))
    }

    /// Overridable method; calls bind to the dynamic type's final overrider
    pub fn virtual_method<F>(self, name: impl Into<String>, params: &[ValueKind], body: F) -> Self
    where
        F: Fn(&mut Receiver<'_>, &[Value]) -> Result<Value, SandboxError> + 'static,
    {
        self.push_method(name.into(), params, true, Some(Rc::new(body)))
    }

    /// Overridable method without an implementation
    pub fn pure_virtual(self, name: impl Into<String>, params: &[ValueKind]) -> Self {
        self.push_method(name.into(), params, true, None)
    }

    /// Body run against this class's sub-object when the object is destroyed
    pub fn destructor<F>(mut self, body: F) -> Self
    where
        F: Fn(&mut Receiver<'_>, &[Value]) -> Result<Value, SandboxError> + 'static,
    {
        self.destructor = Some(MethodDef {
            name: format!("~{}", self.name),
            params: Vec::new(),
            overridable: true,
            body: Some(Rc::new(body)),
        });
        self
    }

    fn push_field(mut self, name: String, default: Value, visibility: Visibility) -> Self {
        self.fields.push(FieldDef {
            name,
            default,
            visibility,
        });
        self
    }

    fn push_method(
        mut self,
        name: String,
        params: &[ValueKind],
        overridable: bool,
        body: Option<MethodBody>,
    ) -> Self {
        self.methods.push(MethodDef {
            name,
            params: params.to_vec(),
            overridable,
            body,
        });
        self
    }

    /// Whether this class itself declares a field or method with the name
    pub fn declares(&self, member: &str) -> bool {
        self.fields.iter().any(|f| f.name == member) || self.methods.iter().any(|m| m.name == member)
    }

    pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every declaration of `name` in this class, in declaration order
    pub fn overloads(&self, name: &str) -> Vec<&MethodDef> {
        self.methods.iter().filter(|m| m.name == name).collect()
    }

    /// This class's declaration with the same name and parameters, if any
    pub fn method_with_signature(&self, like: &MethodDef) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.same_signature(like))
    }
}

/// One sub-object in a layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubobjectInfo {
    pub class: String,
    /// First path from the most-derived class that placed this sub-object
    pub path: Vec<String>,
    /// Direct base sub-objects
    pub bases: Vec<usize>,
    pub shared: bool,
}

impl SubobjectInfo {
    pub fn path_string(&self) -> String {
        self.path.join("::")
    }
}

/// Sub-object tree of a class; index 0 is the most-derived class itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Layout {
    subobjects: Vec<SubobjectInfo>,
}

impl Layout {
    pub fn subobjects(&self) -> &[SubobjectInfo] {
        &self.subobjects
    }

    pub fn get(&self, index: usize) -> Option<&SubobjectInfo> {
        self.subobjects.get(index)
    }

    pub fn len(&self) -> usize {
        self.subobjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subobjects.is_empty()
    }

    /// `root` and every sub-object reachable through its bases, sorted
    pub fn subtree(&self, root: usize) -> Vec<usize> {
        let mut seen = FxHashSet::default();
        let mut pending = vec![root];
        while let Some(index) = pending.pop() {
            if !seen.insert(index) {
                continue;
            }
            if let Some(info) = self.subobjects.get(index) {
                pending.extend(info.bases.iter().copied());
            }
        }
        let mut out: Vec<usize> = seen.into_iter().collect();
        out.sort_unstable();
        out
    }

    /// Sub-objects in the order their destructors run
    pub fn destruction_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.subobjects.len());
        self.unwind(0, &mut order);
        for (index, _) in self
            .subobjects
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, info)| info.shared)
        {
            self.unwind(index, &mut order);
        }
        order
    }

    // Shared bases are skipped here; they go last
    fn unwind(&self, index: usize, order: &mut Vec<usize>) {
        order.push(index);
        let Some(info) = self.subobjects.get(index) else {
            return;
        };
        for &base in info.bases.iter().rev() {
            if self.subobjects.get(base).is_some_and(|b| !b.shared) {
                self.unwind(base, order);
            }
        }
    }

    /// Follow a qualified path such as `["Bat", "Mammal", "Animal"]`
    pub fn navigate(&self, path: &[&str]) -> Option<usize> {
        let (first, rest) = path.split_first()?;
        if self.subobjects.first()?.class != *first {
            return None;
        }
        let mut current = 0;
        for step in rest {
            let info = self.subobjects.get(current)?;
            current = info
                .bases
                .iter()
                .copied()
                .find(|&base| self.subobjects.get(base).is_some_and(|b| b.class == *step))?;
        }
        Some(current)
    }

    /// Indices of every sub-object of the given class
    pub fn occurrences(&self, class: &str) -> Vec<usize> {
        self.subobjects
            .iter()
            .enumerate()
            .filter(|(_, info)| info.class == class)
            .map(|(index, _)| index)
            .collect()
    }

    /// The unique sub-object a view of the given class refers to
    pub fn upcast(&self, view: &str) -> Result<usize, SandboxError> {
        let hits = self.occurrences(view);
        match hits.as_slice() {
            [single] => Ok(*single),
            [] => Err(SandboxError::InvalidCast {
                from: self.class_at(0),
                to: view.to_string(),
            }),
            _ => Err(SandboxError::AmbiguousResolution {
                member: view.to_string(),
                paths: self.paths(&hits),
            }),
        }
    }

    fn class_at(&self, index: usize) -> String {
        self.subobjects
            .get(index)
            .map(|info| info.class.clone())
            .unwrap_or_default()
    }

    fn paths(&self, indices: &[usize]) -> Vec<String> {
        indices
            .iter()
            .filter_map(|&i| self.subobjects.get(i))
            .map(SubobjectInfo::path_string)
            .collect()
    }
}

/// All registered classes and their layouts
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    classes: FxHashMap<String, ClassDef>,
    layouts: FxHashMap<String, Layout>,
    order: Vec<String>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class; its bases must already be registered
    pub fn register(&mut self, class: ClassDef) -> Result<(), SandboxError> {
        if self.classes.contains_key(&class.name) {
            return Err(SandboxError::DuplicateClass { name: class.name });
        }
        let mut seen = FxHashSet::default();
        for base in &class.bases {
            if !self.classes.contains_key(&base.class) {
                return Err(SandboxError::UnknownClass {
                    name: base.class.clone(),
                });
            }
            if !seen.insert(base.class.as_str()) {
                return Err(SandboxError::DuplicateBase {
                    class: class.name.clone(),
                    base: base.class.clone(),
                });
            }
        }

        let name = class.name.clone();
        self.classes.insert(name.clone(), class);
        let layout = self.build_layout(&name);
        debug!(class = %name, subobjects = layout.len(), "registered class");
        self.layouts.insert(name.clone(), layout);
        self.order.push(name);
        Ok(())
    }

    pub fn class(&self, name: &str) -> Option<&ClassDef> {
        self.classes.get(name)
    }

    /// Registered classes in registration order
    pub fn classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.order.iter().filter_map(|name| self.classes.get(name))
    }

    pub fn layout(&self, class: &str) -> Result<&Layout, SandboxError> {
        self.layouts
            .get(class)
            .ok_or_else(|| SandboxError::UnknownClass {
                name: class.to_string(),
            })
    }

    /// Whether `derived` has at least one `base` sub-object
    pub fn is_subclass(&self, derived: &str, base: &str) -> bool {
        self.layouts
            .get(derived)
            .is_some_and(|layout| !layout.occurrences(base).is_empty())
    }

    /// Build a fresh object, refusing classes with unimplemented pure methods
    pub fn instantiate(&self, class: &str) -> Result<Instance, SandboxError> {
        let layout = self.layout(class)?;

        for (index, info) in layout.subobjects().iter().enumerate() {
            let Some(def) = self.classes.get(&info.class) else {
                continue;
            };
            for method in def.methods.iter().filter(|m| m.is_pure()) {
                let (_, overrider) = self.final_overrider(layout, index, method)?;
                if overrider.is_pure() {
                    return Err(SandboxError::AbstractInstantiation {
                        class: class.to_string(),
                        method: method.name.clone(),
                    });
                }
            }
        }

        let subobjects = layout
            .subobjects()
            .iter()
            .map(|info| {
                self.classes
                    .get(&info.class)
                    .map(|def| {
                        def.fields
                            .iter()
                            .map(|f| (f.name.clone(), f.default.clone()))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();

        Ok(Instance::new(class.to_string(), subobjects))
    }

    /// Name lookup from a sub-object: the unique dominant declaration
    pub fn lookup(&self, layout: &Layout, from: usize, member: &str) -> Result<usize, SandboxError> {
        let candidates: Vec<usize> = layout
            .subtree(from)
            .into_iter()
            .filter(|&i| self.class_at(layout, i).is_some_and(|def| def.declares(member)))
            .collect();
        let winners = self.dominant(layout, &candidates);

        match winners.as_slice() {
            [single] => Ok(*single),
            [] => Err(SandboxError::UnknownMember {
                class: layout.class_at(from),
                member: member.to_string(),
            }),
            _ => Err(SandboxError::AmbiguousResolution {
                member: member.to_string(),
                paths: layout.paths(&winners),
            }),
        }
    }

    /// Lookup followed by overload selection; no dynamic dispatch
    pub fn resolve_static(
        &self,
        layout: &Layout,
        from: usize,
        name: &str,
        args: &[Value],
    ) -> Result<(usize, &MethodDef), SandboxError> {
        let at = self.lookup(layout, from, name)?;
        let def = self.class_at(layout, at).ok_or_else(|| SandboxError::UnknownClass {
            name: layout.class_at(at),
        })?;

        let overloads = def.overloads(name);
        if overloads.is_empty() {
            // The name resolved to a field
            return Err(SandboxError::UnknownMember {
                class: def.name.clone(),
                member: name.to_string(),
            });
        }
        let method = self.select_overload(name, overloads, args)?;
        Ok((at, method))
    }

    fn select_overload<'r>(
        &'r self,
        name: &str,
        overloads: Vec<&'r MethodDef>,
        args: &[Value],
    ) -> Result<&'r MethodDef, SandboxError> {
        if let Some(exact) = overloads.iter().copied().find(|m| m.accepts(args)) {
            return Ok(exact);
        }

        let kinds: Vec<ValueKind> = args.iter().map(Value::kind).collect();
        let viable: Vec<&MethodDef> = overloads
            .into_iter()
            .filter(|m| self.converts(&kinds, &m.params))
            .collect();
        let best: Vec<&MethodDef> = viable
            .iter()
            .copied()
            .filter(|m| viable.iter().all(|other| self.converts(&m.params, &other.params)))
            .collect();

        match (best.as_slice(), viable.is_empty()) {
            ([single], _) => Ok(*single),
            (_, true) => Err(SandboxError::NoMatchingOverload {
                member: name.to_string(),
                args: describe_kinds(args),
            }),
            (_, false) => Err(SandboxError::AmbiguousResolution {
                member: name.to_string(),
                paths: viable.iter().map(|m| m.signature()).collect(),
            }),
        }
    }

    /// Whether values of the `from` kinds can be passed as the `to` kinds
    fn converts(&self, from: &[ValueKind], to: &[ValueKind]) -> bool {
        from.len() == to.len()
            && from.iter().zip(to).all(|(arg, param)| {
                arg == param
                    || match (arg.as_class(), param.as_class()) {
                        (Some(derived), Some(base)) => self.upcasts(derived, base),
                        _ => false,
                    }
            })
    }

    /// Whether `derived` has exactly one `base` sub-object
    pub fn upcasts(&self, derived: &str, base: &str) -> bool {
        self.layouts
            .get(derived)
            .is_some_and(|layout| layout.occurrences(base).len() == 1)
    }

    /// Static resolution, then the final overrider if the method is overridable
    pub fn resolve(
        &self,
        layout: &Layout,
        from: usize,
        name: &str,
        args: &[Value],
    ) -> Result<(usize, &MethodDef), SandboxError> {
        let (at, method) = self.resolve_static(layout, from, name, args)?;
        if self.is_overridable(layout, at, method) {
            self.final_overrider(layout, at, method)
        } else {
            Ok((at, method))
        }
    }

    /// Overridable if declared so here or in any base with the same signature
    pub fn is_overridable(&self, layout: &Layout, at: usize, method: &MethodDef) -> bool {
        method.overridable
            || layout.subtree(at).into_iter().any(|i| {
                self.class_at(layout, i)
                    .and_then(|def| def.method_with_signature(method))
                    .is_some_and(|m| m.overridable)
            })
    }

    /// The most-derived declaration overriding `method` declared at `at`
    pub fn final_overrider(
        &self,
        layout: &Layout,
        at: usize,
        method: &MethodDef,
    ) -> Result<(usize, &MethodDef), SandboxError> {
        let candidates: Vec<usize> = layout
            .subtree(0)
            .into_iter()
            .filter(|&i| {
                layout.subtree(i).contains(&at)
                    && self
                        .class_at(layout, i)
                        .is_some_and(|def| def.method_with_signature(method).is_some())
            })
            .collect();
        let winners = self.dominant(layout, &candidates);

        match winners.as_slice() {
            [single] => self
                .class_at(layout, *single)
                .and_then(|def| def.method_with_signature(method))
                .map(|def| (*single, def))
                .ok_or_else(|| SandboxError::UnknownMember {
                    class: layout.class_at(*single),
                    member: method.name.clone(),
                }),
            [] => Err(SandboxError::UnknownMember {
                class: layout.class_at(at),
                member: method.name.clone(),
            }),
            _ => Err(SandboxError::AmbiguousResolution {
                member: method.signature(),
                paths: layout.paths(&winners),
            }),
        }
    }

    /// Run every destructor of the object's class chain
    ///
    /// A failing destructor does not stop the others; the first error is
    /// returned once all have run.
    pub fn run_destructors(
        &self,
        instance: &mut Instance,
        output: &mut Vec<String>,
    ) -> Result<(), SandboxError> {
        let layout = self.layout(instance.class())?;
        let mut first_error = None;
        for at in layout.destruction_order() {
            let Some(body) = self
                .class_at(layout, at)
                .and_then(|def| def.destructor.as_ref())
                .and_then(MethodDef::body)
                .cloned()
            else {
                continue;
            };
            let mut receiver = Receiver::new(self, layout, &mut *instance, at, &mut *output);
            if let Err(err) = (body.as_ref())(&mut receiver, &[]) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Check a field exists at `index` and may be accessed by `accessor`
    /// (`None` means from outside the object)
    pub fn check_field_access(
        &self,
        layout: &Layout,
        index: usize,
        field: &str,
        accessor: Option<usize>,
    ) -> Result<(), SandboxError> {
        let def = self.class_at(layout, index).ok_or_else(|| SandboxError::UnknownClass {
            name: layout.class_at(index),
        })?;
        let field_def = def.field_def(field).ok_or_else(|| SandboxError::UnknownMember {
            class: def.name.clone(),
            member: field.to_string(),
        })?;
        if field_def.visibility == Visibility::Private && accessor != Some(index) {
            return Err(SandboxError::AccessViolation {
                class: def.name.clone(),
                field: field.to_string(),
            });
        }
        Ok(())
    }

    fn class_at(&self, layout: &Layout, index: usize) -> Option<&ClassDef> {
        layout
            .get(index)
            .and_then(|info| self.classes.get(&info.class))
    }

    /// Drop candidates hidden by a more-derived candidate
    fn dominant(&self, layout: &Layout, candidates: &[usize]) -> Vec<usize> {
        candidates
            .iter()
            .copied()
            .filter(|&c| {
                !candidates
                    .iter()
                    .any(|&d| d != c && layout.subtree(d).contains(&c))
            })
            .collect()
    }

    fn build_layout(&self, class: &str) -> Layout {
        let mut layout = Layout::default();
        let mut shared = FxHashMap::default();
        self.place(class, vec![class.to_string()], false, &mut layout, &mut shared);
        layout
    }

    fn place(
        &self,
        class: &str,
        path: Vec<String>,
        is_shared: bool,
        layout: &mut Layout,
        shared: &mut FxHashMap<String, usize>,
    ) -> usize {
        let index = layout.subobjects.len();
        layout.subobjects.push(SubobjectInfo {
            class: class.to_string(),
            path: path.clone(),
            bases: Vec::new(),
            shared: is_shared,
        });

        let Some(def) = self.classes.get(class) else {
            return index;
        };
        for base in &def.bases {
            let mut base_path = path.clone();
            base_path.push(base.class.clone());
            let child = if base.shared {
                match shared.get(&base.class) {
                    Some(&existing) => existing,
                    None => {
                        let placed = self.place(&base.class, base_path, true, layout, shared);
                        shared.insert(base.class.clone(), placed);
                        placed
                    }
                }
            } else {
                self.place(&base.class, base_path, false, layout, shared)
            };
            layout.subobjects[index].bases.push(child);
        }
        index
    }
}
