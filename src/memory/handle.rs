//! Typed handles into the sandbox heap
//!
//! Handles are small `Copy` tokens: a [`HandleId`] naming the handle's record
//! in the heap, and a [`NodeId`] naming the slot it points at. Because they
//! are plain tokens, misuse (releasing twice, using a moved-from handle) is
//! possible at the type level and is detected by the heap at runtime.
//!
//! # Node identity
//!
//! A [`NodeId`] is an `index/generation` pair. When a node is destroyed its
//! slot's generation is bumped, so an old id never aliases a node that later
//! reuses the same slot.

use std::fmt;
use std::marker::PhantomData;

/// Identity of a single issued handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Slot index plus generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub index: u32,
    pub generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}v{}", self.index, self.generation)
    }
}

/// The three ownership relations a handle can express
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Shared,
    Weak,
    Exclusive,
}

impl HandleKind {
    /// Whether holding this kind of handle keeps the target alive
    pub fn is_owning(self) -> bool {
        !matches!(self, HandleKind::Weak)
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleKind::Shared => "shared",
            HandleKind::Weak => "weak",
            HandleKind::Exclusive => "exclusive",
        };
        f.write_str(name)
    }
}

/// Common surface of the typed handles
pub trait Handle: Copy {
    /// Payload type of the heap that issued the handle
    type Target;

    const KIND: HandleKind;

    fn id(&self) -> HandleId;

    fn node(&self) -> NodeId;
}

macro_rules! typed_handle {
    ($(#[$doc:meta])* $name:ident, $kind:expr) => {
        $(#[$doc])*
        pub struct $name<T> {
            id: HandleId,
            node: NodeId,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            pub(crate) fn new(id: HandleId, node: NodeId) -> Self {
                $name {
                    id,
                    node,
                    _marker: PhantomData,
                }
            }

            pub fn id(&self) -> HandleId {
                self.id
            }

            pub fn node(&self) -> NodeId {
                self.node
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> PartialEq for $name<T> {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id && self.node == other.node
            }
        }

        impl<T> Eq for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("id", &self.id)
                    .field("node", &self.node)
                    .finish()
            }
        }

        impl<T> fmt::Display for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{} {} -> {}", $kind, self.id, self.node)
            }
        }

        impl<T> Handle for $name<T> {
            type Target = T;

            const KIND: HandleKind = $kind;

            fn id(&self) -> HandleId {
                self.id
            }

            fn node(&self) -> NodeId {
                self.node
            }
        }
    };
}

typed_handle!(
    /// Reference-counted owner; the target lives while any shared handle does
    SharedHandle,
    HandleKind::Shared
);

typed_handle!(
    /// Non-owning observer of a shared node
    WeakHandle,
    HandleKind::Weak
);

typed_handle!(
    /// Single owner; transfer invalidates the source
    ExclusiveHandle,
    HandleKind::Exclusive
);
